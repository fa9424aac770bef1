//! Response relay and access logging.
//!
//! # Responsibilities
//! - Copy the upstream status, headers and body back to the caller
//! - Emit one access-log line per request
//!
//! # Design Decisions
//! - No transformation of status or body; the body is relayed as buffered
//! - Connection-level headers are left to the server; everything else passes through
//! - The access line is `<status> <method> <path>?<query> <body>`

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use std::fmt;

use crate::http::request::InboundRequest;
use crate::observability::logging::ACCESS_LOG_TARGET;
use crate::upstream::UpstreamResponse;

/// Response headers that describe the upstream connection, not the message.
const CONNECTION_HEADERS: [header::HeaderName; 2] = [header::CONNECTION, header::TRANSFER_ENCODING];

/// Turn an upstream reply into the response sent to the caller.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let mut headers = upstream.headers;
    for name in &CONNECTION_HEADERS {
        headers.remove(name);
    }

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    response
}

/// One access-log record.
#[derive(Debug)]
pub struct AccessRecord<'a> {
    pub status: StatusCode,
    pub request: &'a InboundRequest,
}

impl fmt::Display for AccessRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}?{} {}",
            self.status.as_u16(),
            self.request.method,
            self.request.path,
            self.request.query,
            String::from_utf8_lossy(&self.request.body)
        )
    }
}

/// Write the access line for a finished exchange.
pub fn log_access(status: StatusCode, request: &InboundRequest) {
    let record = AccessRecord { status, request };
    tracing::info!(target: ACCESS_LOG_TARGET, "{record}");
}
