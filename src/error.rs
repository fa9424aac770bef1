//! Per-request error taxonomy and its mapping onto HTTP responses.
//!
//! # Design Decisions
//! - Every error stays local to the request that produced it
//! - Upstream timeouts result in 504 Gateway Timeout
//! - Other transport and credential failures result in 502 Bad Gateway
//! - Unsupported methods get an empty 405 and never reach the upstream

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::signing::CredentialsError;

/// Failure of a single proxied exchange.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Connection refused, DNS failure, reset, or a malformed upstream reply.
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// Connect or total deadline elapsed.
    #[error("upstream request timed out")]
    Timeout,

    /// Signing credentials could not be resolved.
    #[error("could not resolve signing credentials: {0}")]
    Credentials(#[from] CredentialsError),

    /// Inbound method outside the six forwarded verbs.
    #[error("method {0} is not forwarded")]
    UnsupportedMethod(String),

    /// Inbound body exceeded `max_body_bytes`.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Inbound request could not be turned into an upstream request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure to assemble the proxy before it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("invalid upstream URL: {0}")]
    UpstreamUrl(#[from] url::ParseError),

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

impl ProxyError {
    /// Status code returned to the caller for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Transport(_) | ProxyError::Credentials(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout
        } else {
            ProxyError::Transport(err.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ProxyError::UnsupportedMethod(_) => Body::empty(),
            other => Body::from(other.to_string()),
        };
        (status, body).into_response()
    }
}
