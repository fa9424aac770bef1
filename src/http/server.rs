//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router that sends every method and path to one handler
//! - Wire up middleware (tracing with request IDs, optional Basic Auth)
//! - Bind the server to a listener and stop on the shutdown broadcast
//! - Run each request through normalize → resolve → sign → send → relay
//!
//! # Design Decisions
//! - Bodies are fully buffered; the signature covers the payload hash
//! - Exactly one upstream call per admitted request, no retries
//! - Every failure is turned into a response here; nothing escapes the handler

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{request::Parts, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, StartupError};
use crate::http::auth::{basic_auth_middleware, BasicAuth};
use crate::http::request::InboundRequest;
use crate::http::response::{log_access, relay};
use crate::observability::metrics;
use crate::routing::PathResolver;
use crate::signing::{provider_from_config, CredentialsProvider};
use crate::upstream::SigningClient;

/// Application state injected into the handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: SigningClient,
    pub resolver: PathResolver,
    pub max_body_bytes: usize,
}

/// HTTP server for the signing proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server from a validated configuration.
    ///
    /// The credentials provider is chosen from the configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, StartupError> {
        let credentials = provider_from_config(config)?;
        Self::with_credentials(config, credentials)
    }

    /// Create a server that signs with the given provider.
    pub fn with_credentials(
        config: &ProxyConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, StartupError> {
        let state = AppState {
            client: SigningClient::from_config(config, credentials)?,
            resolver: PathResolver::new(config.path_prefix()),
            max_body_bytes: config.max_body_bytes,
        };

        tracing::info!(
            upstream = %state.client.base_url(),
            path_prefix = state.resolver.prefix().unwrap_or("-"),
            basic_auth = config.basic_auth().is_some(),
            "Proxy configured"
        );

        let router = Self::build_router(BasicAuth::from_config(config), state);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(gate: Option<BasicAuth>, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state);

        if let Some(gate) = gate {
            router = router.layer(middleware::from_fn_with_state(
                Arc::new(gate),
                basic_auth_middleware,
            ));
        }

        router.layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
    }

    /// The router, for driving the proxy without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward one inbound request to the upstream and relay the reply.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let (inbound, response) = match read_body(body, state.max_body_bytes).await {
        Ok(body) => {
            let inbound = InboundRequest::from_parts(&parts, body);
            let response = forward(&state, &inbound).await;
            (inbound, response)
        }
        Err(err) => {
            let inbound = InboundRequest::from_parts(&parts, Bytes::new());
            (inbound, failure(&parts, err))
        }
    };

    let status = response.status();
    log_access(status, &inbound);
    metrics::record_request(inbound.method.metric_label(), status.as_u16(), start);
    response
}

async fn forward(state: &AppState, inbound: &InboundRequest) -> Response {
    let headers = inbound.normalized_headers();
    let target = state.resolver.resolve(&inbound.path, &inbound.query);

    tracing::debug!(
        method = %inbound.method,
        target = %target,
        headers = headers.len(),
        "Forwarding request"
    );

    match state
        .client
        .send(&inbound.method, &target, &headers, &inbound.body)
        .await
    {
        Ok(upstream) => relay(upstream),
        Err(err) => {
            match &err {
                ProxyError::UnsupportedMethod(method) => {
                    tracing::debug!(method = %method, "Method not forwarded");
                }
                other => tracing::error!(error = %other, target = %target, "Upstream exchange failed"),
            }
            err.into_response()
        }
    }
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    to_bytes(body, limit).await.map_err(|err| {
        let source = err.into_inner();
        if source.is::<http_body_util::LengthLimitError>() {
            ProxyError::BodyTooLarge { limit }
        } else {
            ProxyError::InvalidRequest(source.to_string())
        }
    })
}

fn failure(parts: &Parts, err: ProxyError) -> Response {
    tracing::warn!(path = %parts.uri.path(), error = %err, "Request body rejected");
    err.into_response()
}
