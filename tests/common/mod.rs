//! Shared utilities for integration testing.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use sigv4_proxy::config::ProxyConfig;
use sigv4_proxy::lifecycle::Shutdown;
use sigv4_proxy::signing::canonical::{
    build_canonical_request, canonical_header_value, UriEncoding,
};
use sigv4_proxy::signing::sigv4::{
    build_string_to_sign, compute_signature, derive_signing_key, hash_payload,
};
use sigv4_proxy::signing::CredentialsProvider;
use sigv4_proxy::HttpServer;

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Origin-form target, e.g. `/foo?bar=1`.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Check the SigV4 signature the way the upstream service would: rebuild
    /// the canonical request from what arrived on the wire and re-sign it
    /// with `secret`.
    pub fn verify_signature(&self, secret: &str) -> Result<(), String> {
        let authorization = self.header("authorization").ok_or("no authorization header")?;
        let fields = authorization
            .strip_prefix("AWS4-HMAC-SHA256 ")
            .ok_or("not a SigV4 authorization")?;
        let field = |name: &str| {
            fields
                .split(", ")
                .find_map(|part| part.strip_prefix(name))
                .ok_or(format!("missing {name}"))
        };
        let credential = field("Credential=")?;
        let signed_names = field("SignedHeaders=")?;
        let signature = field("Signature=")?;

        let scope: Vec<&str> = credential.splitn(2, '/').collect();
        let credential_scope = scope.get(1).ok_or("malformed credential")?;
        let parts: Vec<&str> = credential_scope.split('/').collect();
        let &[date, region, service, "aws4_request"] = parts.as_slice() else {
            return Err(format!("malformed scope {credential_scope}"));
        };

        let payload_hash = hash_payload(&self.body);
        if self.header("x-amz-content-sha256") != Some(payload_hash.as_str()) {
            return Err("x-amz-content-sha256 does not match the body".into());
        }

        let mut headers = BTreeMap::new();
        for name in signed_names.split(';') {
            let value = self.header(name).ok_or(format!("signed header {name} not sent"))?;
            headers.insert(name.to_string(), canonical_header_value(value));
        }

        let (path, query) = self.uri.split_once('?').unwrap_or((self.uri.as_str(), ""));
        let canonical = build_canonical_request(
            &self.method,
            path,
            query,
            &headers,
            UriEncoding::for_service(service),
            &payload_hash,
        );
        let amz_date = self.header("x-amz-date").ok_or("no x-amz-date header")?;
        let string_to_sign = build_string_to_sign(amz_date, credential_scope, &canonical);
        let expected = compute_signature(
            &derive_signing_key(secret, date, region, service),
            &string_to_sign,
        );

        if expected == signature {
            Ok(())
        } else {
            Err(format!("signature mismatch for canonical request:\n{canonical}"))
        }
    }
}

#[derive(Clone)]
struct UpstreamState {
    status: StatusCode,
    body: &'static str,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Upstream that records every request and answers with a fixed JSON reply.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = UpstreamState {
            status,
            body,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(record).with_state(state);
        let addr = serve(app).await;
        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body,
    });

    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body,
    )
        .into_response()
}

pub const IMDS_ROLE: &str = "proxy-role";
pub const IMDS_ACCESS_KEY: &str = "ASIAIMDSEXAMPLE";
pub const IMDS_SECRET_KEY: &str = "imds-secret";
pub const IMDS_SESSION_TOKEN: &str = "imds-session-token";

/// Instance metadata service serving one role's temporary credentials.
pub async fn start_mock_imds() -> SocketAddr {
    let document = serde_json::json!({
        "Code": "Success",
        "LastUpdated": "2026-10-15T12:00:00Z",
        "Type": "AWS-HMAC",
        "AccessKeyId": IMDS_ACCESS_KEY,
        "SecretAccessKey": IMDS_SECRET_KEY,
        "Token": IMDS_SESSION_TOKEN,
        "Expiration": "2099-01-01T00:00:00Z",
    })
    .to_string();

    let app = Router::new()
        .route("/latest/api/token", put(|| async { "imds-v2-token" }))
        .route(
            "/latest/meta-data/iam/security-credentials/",
            get(|| async { IMDS_ROLE }),
        )
        .route(
            &format!("/latest/meta-data/iam/security-credentials/{IMDS_ROLE}"),
            get(move || {
                let document = document.clone();
                async move { document }
            }),
        );
    serve(app).await
}

/// Serve `app` on an ephemeral port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Secret of the static key pair in [`proxy_config`].
pub const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

/// Minimal valid configuration pointing at `upstream_url`.
pub fn proxy_config(upstream_url: &str) -> ProxyConfig {
    ProxyConfig {
        upstream_url: Some(upstream_url.to_string()),
        upstream_service_name: Some("execute-api".into()),
        upstream_region: Some("us-east-1".into()),
        aws_access_key: Some("AKIDEXAMPLE".into()),
        aws_secret_access_key: Some(SECRET_KEY.into()),
        ..Default::default()
    }
}

/// A running proxy. Dropping it leaves the server task to the runtime.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl RunningProxy {
    pub fn url(&self, target: &str) -> String {
        format!("http://{}{}", self.addr, target)
    }
}

/// Start the proxy for `config` on an ephemeral port.
pub async fn start_proxy(config: &ProxyConfig) -> RunningProxy {
    start_server(HttpServer::new(config).unwrap()).await
}

/// Start the proxy with an explicit credentials provider.
pub async fn start_proxy_with(
    config: &ProxyConfig,
    credentials: Arc<dyn CredentialsProvider>,
) -> RunningProxy {
    start_server(HttpServer::with_credentials(config, credentials).unwrap()).await
}

async fn start_server(server: HttpServer) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    RunningProxy { addr, shutdown }
}

/// Client that talks to the proxy directly, bypassing any environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
