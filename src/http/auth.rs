//! HTTP Basic Auth gate.
//!
//! Wraps the whole proxy when both `http_username` and `http_password` are
//! configured. Rejected requests never reach the normalizer or the upstream.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::ProxyConfig;

pub const REALM: &str = "Restricted Area";

/// Result of checking an `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted,
    /// No credentials supplied.
    Missing,
    /// Credentials supplied with a scheme other than Basic.
    NotBasic,
    Denied,
}

/// Configured Basic Auth credentials.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The gate for a configuration, if one is enabled.
    pub fn from_config(config: &ProxyConfig) -> Option<Self> {
        config.basic_auth().map(|(user, pass)| Self::new(user, pass))
    }

    pub fn check(&self, authorization: Option<&HeaderValue>) -> AuthOutcome {
        let Some(value) = authorization.and_then(|v| v.to_str().ok()) else {
            return AuthOutcome::Missing;
        };
        let Some((scheme, encoded)) = value.trim().split_once(' ') else {
            return AuthOutcome::NotBasic;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return AuthOutcome::NotBasic;
        }

        let decoded = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return AuthOutcome::Denied,
        };
        let Some((user, pass)) = std::str::from_utf8(&decoded)
            .ok()
            .and_then(|s| s.split_once(':'))
        else {
            return AuthOutcome::Denied;
        };

        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.password.as_bytes());
        if bool::from(user_ok & pass_ok) {
            AuthOutcome::Granted
        } else {
            AuthOutcome::Denied
        }
    }
}

/// Challenge sent with every 401.
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{REALM}\""))],
    )
        .into_response()
}

pub async fn basic_auth_middleware(
    State(gate): State<Arc<BasicAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match gate.check(request.headers().get(header::AUTHORIZATION)) {
        AuthOutcome::Granted => next.run(request).await,
        AuthOutcome::NotBasic => {
            tracing::debug!(path = %request.uri().path(), "Non-Basic authorization rejected");
            StatusCode::BAD_REQUEST.into_response()
        }
        outcome => {
            tracing::debug!(path = %request.uri().path(), ?outcome, "Basic auth rejected");
            unauthorized()
        }
    }
}
