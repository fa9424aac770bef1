//! AWS Signature Version 4 request signing.
//!
//! # Data Flow
//! ```text
//! method, url, headers, body, credentials, time
//!     → canonical request (canonical.rs)
//!     → string to sign (algorithm, timestamp, scope, hash of canonical request)
//!     → HMAC-SHA256 with the derived signing key
//!     → Authorization / X-Amz-* headers
//! ```

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

use crate::signing::canonical::{
    build_canonical_request, canonical_header_value, signed_headers_string, UriEncoding,
};
use crate::signing::credentials::Credentials;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub const AUTHORIZATION: &str = "authorization";
pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Headers the signer owns; inbound copies are dropped before signing.
pub const SIGNING_HEADERS: &[&str] = &[
    AUTHORIZATION,
    X_AMZ_DATE,
    X_AMZ_CONTENT_SHA256,
    X_AMZ_SECURITY_TOKEN,
];

/// Headers that are forwarded but left out of the signature.
const UNSIGNED_HEADERS: &[&str] = &[AUTHORIZATION, "user-agent", "expect", "x-amzn-trace-id"];

type HmacSha256 = Hmac<Sha256>;

/// Service scope a request is signed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScope {
    pub service: String,
    pub region: String,
}

impl SigningScope {
    pub fn new(service: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
        }
    }
}

/// The parts of an outbound request that go into its signature.
#[derive(Debug)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub headers: &'a [(String, String)],
    pub body: &'a [u8],
}

/// Headers to attach to the outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningOutput {
    pub headers: Vec<(&'static str, String)>,
    pub signature: String,
}

/// Sign a request at the given instant.
///
/// The result is a pure function of its inputs; callers pass `Utc::now()`.
pub fn sign(
    request: &SignableRequest<'_>,
    scope: &SigningScope,
    credentials: &Credentials,
    time: DateTime<Utc>,
) -> SigningOutput {
    let amz_date = time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = time.format("%Y%m%d").to_string();
    let payload_hash = hash_payload(request.body);

    let mut signed: BTreeMap<String, String> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), canonical_header_value(value)))
        .filter(|(name, _)| !UNSIGNED_HEADERS.contains(&name.as_str()))
        .collect();

    signed.insert("host".to_string(), host_header(request.url));
    signed.insert(X_AMZ_DATE.to_string(), amz_date.clone());
    signed.insert(X_AMZ_CONTENT_SHA256.to_string(), payload_hash.clone());
    if let Some(token) = &credentials.session_token {
        signed.insert(X_AMZ_SECURITY_TOKEN.to_string(), token.clone());
    }

    let canonical_request = build_canonical_request(
        request.method,
        request.url.path(),
        request.url.query().unwrap_or(""),
        &signed,
        UriEncoding::for_service(&scope.service),
        &payload_hash,
    );
    tracing::trace!(canonical_request = %canonical_request, "Canonical request built");

    let credential_scope = format!("{date}/{}/{}/aws4_request", scope.region, scope.service);
    let string_to_sign = build_string_to_sign(&amz_date, &credential_scope, &canonical_request);
    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        &date,
        &scope.region,
        &scope.service,
    );
    let signature = compute_signature(&signing_key, &string_to_sign);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={}, Signature={signature}",
        credentials.access_key_id,
        signed_headers_string(&signed),
    );

    let mut headers = vec![
        (AUTHORIZATION, authorization),
        (X_AMZ_DATE, amz_date),
        (X_AMZ_CONTENT_SHA256, payload_hash),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push((X_AMZ_SECURITY_TOKEN, token.clone()));
    }

    SigningOutput { headers, signature }
}

/// Hex-encoded SHA-256 of a request body.
pub fn hash_payload(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// `Host` value for the URL: port included only when it is not the scheme default.
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

pub fn build_string_to_sign(amz_date: &str, credential_scope: &str, canonical_request: &str) -> String {
    let hashed = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("{ALGORITHM}\n{amz_date}\n{credential_scope}\n{hashed}")
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

pub fn compute_signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
