//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Required upstream settings are present
//! - Paired settings are supplied together
//! - Addresses and ports are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("`upstream_url` is not an absolute http(s) URL: {0}")]
    InvalidUpstreamUrl(String),

    #[error("`http_username` and `http_password` must be set together")]
    IncompleteBasicAuth,

    #[error("`listen_port` must be non-zero")]
    InvalidPort,

    #[error("`bind_address` is not an IP address: {0}")]
    InvalidBindAddress(String),

    #[error("`metrics_address` is not a socket address: {0}")]
    InvalidMetricsAddress(String),

    #[error("`instance_metadata_endpoint` is not a URL: {0}")]
    InvalidMetadataEndpoint(String),
}

/// Check every semantic rule, collecting all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match non_blank(&config.upstream_url) {
        None => errors.push(ValidationError::Missing("upstream_url")),
        Some(raw) => match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => errors.push(ValidationError::InvalidUpstreamUrl(raw.to_string())),
        },
    }

    if non_blank(&config.upstream_service_name).is_none() {
        errors.push(ValidationError::Missing("upstream_service_name"));
    }
    if non_blank(&config.upstream_region).is_none() {
        errors.push(ValidationError::Missing("upstream_region"));
    }

    if config.http_username.is_some() != config.http_password.is_some() {
        errors.push(ValidationError::IncompleteBasicAuth);
    }

    if config.listen_port == 0 {
        errors.push(ValidationError::InvalidPort);
    }

    if let Some(addr) = &config.bind_address {
        if addr.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress(addr.clone()));
        }
    }

    if let Some(addr) = &config.metrics_address {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if Url::parse(&config.instance_metadata_endpoint).is_err() {
        errors.push(ValidationError::InvalidMetadataEndpoint(
            config.instance_metadata_endpoint.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
