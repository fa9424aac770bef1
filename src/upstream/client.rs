//! Signed upstream HTTP client.
//!
//! # Responsibilities
//! - Map the inbound method onto exactly one upstream call
//! - Build the upstream URL from the base URL and the resolved target
//! - Sign every request with SigV4 just before it is sent
//! - Buffer the upstream reply for the relay
//!
//! # Design Decisions
//! - Fixed 10s connect and 20s total timeouts, no retries
//! - GET, HEAD and DELETE never carry a body
//! - Unsupported methods fail before credentials are resolved or a socket is opened

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, StartupError};
use crate::http::request::{Method, NormalizedHeaders};
use crate::signing::sigv4::SIGNING_HEADERS;
use crate::signing::{sign, CredentialsProvider, SignableRequest, SigningScope};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// The body is re-framed by the client, so inbound framing is not forwarded.
const FRAMING_HEADERS: &[&str] = &["transfer-encoding"];

/// Fully buffered upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Client that signs and sends requests to the single configured upstream.
#[derive(Debug, Clone)]
pub struct SigningClient {
    client: reqwest::Client,
    base_url: Url,
    scope: SigningScope,
    credentials: Arc<dyn CredentialsProvider>,
}

impl SigningClient {
    pub fn new(
        base_url: Url,
        scope: SigningScope,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, StartupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            scope,
            credentials,
        })
    }

    /// Build a client from a validated configuration.
    pub fn from_config(
        config: &ProxyConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, StartupError> {
        let base_url = Url::parse(config.upstream_url.as_deref().unwrap_or_default())?;
        let scope = SigningScope::new(
            config.upstream_service_name.clone().unwrap_or_default(),
            config.upstream_region.clone().unwrap_or_default(),
        );
        Self::new(base_url, scope, credentials)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upstream URL for a `path?query` target.
    ///
    /// The target is appended to the base URL's path; an empty query string
    /// produces no `?` on the wire.
    pub fn upstream_url(&self, target: &str) -> Url {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let base_path = self.base_url.path().trim_end_matches('/');
        let separator = if path.starts_with('/') { "" } else { "/" };

        let mut url = self.base_url.clone();
        url.set_path(&format!("{base_path}{separator}{path}"));
        url.set_query((!query.is_empty()).then_some(query));
        url
    }

    /// Sign and send one request.
    pub async fn send(
        &self,
        method: &Method,
        target: &str,
        headers: &NormalizedHeaders,
        body: &Bytes,
    ) -> Result<UpstreamResponse, ProxyError> {
        let upstream_method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Delete => reqwest::Method::DELETE,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Unsupported(other) => {
                return Err(ProxyError::UnsupportedMethod(other.clone()));
            }
        };
        let body = if method.forwards_body() {
            body.clone()
        } else {
            Bytes::new()
        };

        let url = self.upstream_url(target);
        let (mut header_map, signable_headers) = outbound_headers(headers);

        let credentials = self.credentials.credentials().await?;
        let signed = sign(
            &SignableRequest {
                method: upstream_method.as_str(),
                url: &url,
                headers: &signable_headers,
                body: &body,
            },
            &self.scope,
            &credentials,
            Utc::now(),
        );
        for (name, value) in signed.headers {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ProxyError::InvalidRequest(format!("unusable {name} value: {e}")))?;
            header_map.insert(HeaderName::from_static(name), value);
        }

        tracing::debug!(method = %upstream_method, url = %url, "Sending signed upstream request");

        let response = self
            .client
            .request(upstream_method, url)
            .headers(header_map)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Convert normalized headers into a wire header map plus the pairs to sign.
///
/// Headers the signer owns are dropped, as are names or values that are not
/// valid on the wire.
fn outbound_headers(headers: &NormalizedHeaders) -> (HeaderMap, Vec<(String, String)>) {
    let mut map = HeaderMap::with_capacity(headers.len());
    let mut signable = Vec::with_capacity(headers.len());

    for (name, value) in headers.iter() {
        let lower = name.to_ascii_lowercase();
        if SIGNING_HEADERS.contains(&lower.as_str()) || FRAMING_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(header_name), Ok(header_value)) => {
                map.insert(header_name, header_value);
                signable.push((lower, value.to_string()));
            }
            _ => tracing::warn!(header = %name, "Dropping header that cannot be forwarded"),
        }
    }

    (map, signable)
}
