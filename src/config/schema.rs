//! Configuration schema definitions.
//!
//! The file format is flat: every key sits at the top level, matching the
//! `config.yaml` deployments this proxy has always read. All types derive
//! Serde traits for deserialization from YAML or TOML.

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

/// Default port the proxy listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Default instance metadata service endpoint.
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";

/// Root configuration for the signing proxy.
///
/// Loaded once at startup and never mutated afterwards; subsystems receive it
/// (or pieces of it) behind an `Arc`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL of the upstream service (e.g., "https://svc.example.com").
    pub upstream_url: Option<String>,

    /// Path prefix every forwarded request must start with.
    pub upstream_path_prefix: Option<String>,

    /// SigV4 service name (e.g., "execute-api", "es").
    pub upstream_service_name: Option<String>,

    /// SigV4 region (e.g., "us-east-1").
    pub upstream_region: Option<String>,

    /// Port to listen on.
    pub listen_port: u16,

    /// Address to bind. All interfaces when unset.
    pub bind_address: Option<String>,

    /// Basic Auth username. Gate is enabled only with a password as well.
    pub http_username: Option<String>,

    /// Basic Auth password.
    pub http_password: Option<String>,

    /// Static access key id. Falls back to `AWS_ACCESS_KEY_ID`.
    pub aws_access_key: Option<String>,

    /// Static secret key. Falls back to `AWS_SECRET_ACCESS_KEY`.
    pub aws_secret_access_key: Option<String>,

    /// Session token for temporary static credentials. Falls back to `AWS_SESSION_TOKEN`.
    pub aws_session_token: Option<String>,

    /// Instance metadata service base URL used for instance-profile credentials.
    pub instance_metadata_endpoint: String,

    /// Largest inbound body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Diagnostic log format.
    pub log_format: LogFormat,

    /// Prometheus exporter address. Metrics are not exported when unset.
    pub metrics_address: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            upstream_path_prefix: None,
            upstream_service_name: None,
            upstream_region: None,
            listen_port: DEFAULT_LISTEN_PORT,
            bind_address: None,
            http_username: None,
            http_password: None,
            aws_access_key: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            instance_metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            log_format: LogFormat::Text,
            metrics_address: None,
        }
    }
}

impl ProxyConfig {
    /// Socket address to listen on.
    ///
    /// An unparsable `bind_address` is rejected by validation, so falling back
    /// to all interfaces here only happens for unvalidated configs.
    pub fn listen_addr(&self) -> SocketAddr {
        let ip = self
            .bind_address
            .as_deref()
            .and_then(|a| a.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.listen_port)
    }

    /// Basic Auth credentials, when both halves are configured.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.http_username, &self.http_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// The configured path prefix, ignoring empty strings.
    pub fn path_prefix(&self) -> Option<&str> {
        self.upstream_path_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
    }

    /// Fill static credential fields from the process environment.
    ///
    /// Each key falls back independently; a value present in the file wins.
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.aws_access_key.is_none() {
            self.aws_access_key = lookup("AWS_ACCESS_KEY_ID");
        }
        if self.aws_secret_access_key.is_none() {
            self.aws_secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        }
        if self.aws_session_token.is_none() {
            self.aws_session_token = lookup("AWS_SESSION_TOKEN");
        }
    }
}

/// Output format for diagnostic logs.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line records.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_defaults_to_all_interfaces() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_listen_addr_uses_bind_address() {
        let config = ProxyConfig {
            bind_address: Some("127.0.0.1".into()),
            listen_port: 9000,
            ..Default::default()
        };
        assert_eq!(config.listen_addr(), "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_basic_auth_requires_both_halves() {
        let mut config = ProxyConfig {
            http_username: Some("admin".into()),
            ..Default::default()
        };
        assert_eq!(config.basic_auth(), None);

        config.http_password = Some("secret".into());
        assert_eq!(config.basic_auth(), Some(("admin", "secret")));
    }

    #[test]
    fn test_env_fallbacks_do_not_override_file_values() {
        let mut config = ProxyConfig {
            aws_access_key: Some("AKIDFILE".into()),
            ..Default::default()
        };
        config.apply_env_fallbacks(|key| match key {
            "AWS_ACCESS_KEY_ID" => Some("AKIDENV".into()),
            "AWS_SECRET_ACCESS_KEY" => Some("secretenv".into()),
            _ => None,
        });

        assert_eq!(config.aws_access_key.as_deref(), Some("AKIDFILE"));
        assert_eq!(config.aws_secret_access_key.as_deref(), Some("secretenv"));
        assert_eq!(config.aws_session_token, None);
    }

    #[test]
    fn test_empty_prefix_is_ignored() {
        let config = ProxyConfig {
            upstream_path_prefix: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.path_prefix(), None);
    }
}
