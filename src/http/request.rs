//! Inbound request capture and header normalization.
//!
//! # Responsibilities
//! - Snapshot method, path, query string, headers and body once per request
//! - Present headers in CGI form (`HTTP_X_FOO`, `CONTENT_TYPE`)
//! - Derive the header set forwarded upstream
//!
//! # Design Decisions
//! - Header keys are case-normalized once, so merging is last-write-wins
//! - Only the first underscore of a key becomes a hyphen; upstreams have
//!   always received e.g. `X-AMZ_TARGET` for `X-Amz-Target`
//! - `HOST` and `CONNECTION` never leave the proxy

use axum::http::{self, request::Parts};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// Prefix of inbound header keys in CGI form.
pub const HEADER_KEY_PREFIX: &str = "HTTP_";

/// CGI key for the content type, which carries no `HTTP_` prefix.
pub const CONTENT_TYPE_KEY: &str = "CONTENT_TYPE";

const CONTENT_LENGTH_KEY: &str = "CONTENT_LENGTH";

/// Request methods the proxy forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Delete,
    Post,
    Put,
    Options,
    /// Any other method; it is never forwarded.
    Unsupported(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Options => "OPTIONS",
            Method::Unsupported(other) => other,
        }
    }

    /// Bounded label for metrics; every unsupported token shares one.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Delete => "DELETE",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Options => "OPTIONS",
            Method::Unsupported(_) => "OTHER",
        }
    }

    /// Whether the inbound body is forwarded with this method.
    pub fn forwards_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Options)
    }
}

impl From<&http::Method> for Method {
    fn from(method: &http::Method) -> Self {
        match method {
            &http::Method::GET => Method::Get,
            &http::Method::HEAD => Method::Head,
            &http::Method::DELETE => Method::Delete,
            &http::Method::POST => Method::Post,
            &http::Method::PUT => Method::Put,
            &http::Method::OPTIONS => Method::Options,
            other => Method::Unsupported(other.as_str().to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one client call.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw (still percent-encoded) path.
    pub path: String,
    /// Raw query string without the leading `?`; empty when absent.
    pub query: String,
    /// Header values keyed by CGI name. Repeated headers keep the last value.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl InboundRequest {
    /// Capture a request from its parts and a fully buffered body.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    cgi_header_key(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        Self {
            method: Method::from(&parts.method),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            headers,
            body,
        }
    }

    /// Headers to forward upstream.
    pub fn normalized_headers(&self) -> NormalizedHeaders {
        NormalizedHeaders::from_cgi(&self.headers)
    }
}

/// CGI key for a wire header name: `x-foo-bar` → `HTTP_X_FOO_BAR`.
///
/// `Content-Type` and `Content-Length` keep their bare CGI names.
pub fn cgi_header_key(name: &str) -> String {
    let key = name.to_ascii_uppercase().replace('-', "_");
    if key == CONTENT_TYPE_KEY || key == CONTENT_LENGTH_KEY {
        key
    } else {
        format!("{HEADER_KEY_PREFIX}{key}")
    }
}

/// Header set forwarded upstream.
///
/// Invariant: never contains `HOST` or `CONNECTION`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedHeaders(BTreeMap<String, String>);

impl NormalizedHeaders {
    /// Normalize CGI-keyed headers.
    ///
    /// Keeps `HTTP_*` keys and `CONTENT_TYPE`, strips the prefix, turns the
    /// first underscore into a hyphen, then drops `HOST` and `CONNECTION`.
    pub fn from_cgi<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut normalized: BTreeMap<String, String> = headers
            .into_iter()
            .filter_map(|(key, value)| {
                let stripped = match key.strip_prefix(HEADER_KEY_PREFIX) {
                    Some(rest) => rest,
                    None if key == CONTENT_TYPE_KEY => key.as_str(),
                    None => return None,
                };
                let renamed = stripped.replacen('_', "-", 1);
                (renamed != "HOST").then(|| (renamed, value.clone()))
            })
            .collect();

        normalized.remove("CONNECTION");
        Self(normalized)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a NormalizedHeaders {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
