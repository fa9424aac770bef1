//! Canonical request construction for AWS Signature Version 4.
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Every component is derived from what actually goes on the wire, so the
//! upstream reconstructs the same string from the request it receives.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unencoded: the RFC 3986 unreserved set.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// How path segments are encoded in the canonical URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriEncoding {
    /// Encode the already-encoded wire path again. Every service except S3.
    Double,
    /// Decode, then encode once. S3 only.
    Single,
}

impl UriEncoding {
    /// Encoding rule for the given service name.
    pub fn for_service(service: &str) -> Self {
        if service.eq_ignore_ascii_case("s3") {
            UriEncoding::Single
        } else {
            UriEncoding::Double
        }
    }
}

/// Build the full canonical request string.
///
/// `headers` must already hold lowercase names mapped to canonical values
/// (see [`canonical_header_value`]); every entry is signed.
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &BTreeMap<String, String>,
    encoding: UriEncoding,
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(path, encoding);
    let canonical_query = build_canonical_query_string(query);
    let canonical_headers = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}"))
        .collect::<Vec<_>>()
        .join("\n");
    let signed_headers = signed_headers_string(headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers}\n{payload_hash}"
    )
}

/// Semicolon-separated, sorted list of signed header names.
pub fn signed_headers_string(headers: &BTreeMap<String, String>) -> String {
    headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

/// Build the canonical URI from the wire path.
///
/// Slashes are preserved and an empty path becomes `/`.
pub fn build_canonical_uri(path: &str, encoding: UriEncoding) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| match encoding {
            UriEncoding::Double => uri_encode(segment),
            UriEncoding::Single => uri_encode(&percent_decode_str(segment).decode_utf8_lossy()),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string.
///
/// Each key and value is decoded as form data (`+` is a space) and re-encoded
/// with the unreserved set, so a query that arrives in any valid encoding
/// canonicalizes the same way. Pairs are sorted by key, then by value.
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (k, v) = param.split_once('=').unwrap_or((param, ""));
            (reencode(k), reencode(v))
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Trim a header value and collapse internal whitespace runs to one space.
pub fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn reencode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    uri_encode(&percent_decode_str(&spaced).decode_utf8_lossy())
}

fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}
