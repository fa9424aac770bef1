//! Signing credential providers.
//!
//! # Responsibilities
//! - Hold a static key pair configured at startup
//! - Resolve instance-profile credentials from the metadata service
//! - Refresh instance-profile credentials before they expire
//!
//! # Design Decisions
//! - Providers are shared read-only behind `Arc<dyn CredentialsProvider>`
//! - The instance-profile cache is an `ArcSwapOption`; no lock is held across awaits
//! - Concurrent refreshes may race; the metadata service is idempotent so last write wins

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Token lifetime requested from IMDSv2.
const METADATA_TOKEN_TTL_SECS: &str = "21600";
const METADATA_TOKEN_PATH: &str = "/latest/api/token";
const METADATA_ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const METADATA_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const METADATA_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

/// Cached credentials are refreshed once they are this close to expiring.
const REFRESH_WINDOW_SECS: i64 = 5 * 60;

/// Error type for credential resolution.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("metadata service request failed: {0}")]
    Metadata(String),

    #[error("no IAM role is attached to this instance")]
    NoRole,

    #[error("metadata service returned {code} for role credentials")]
    Rejected { code: String },

    #[error("malformed credentials document: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CredentialsError {
    fn from(err: reqwest::Error) -> Self {
        CredentialsError::Metadata(err.to_string())
    }
}

/// A resolved key pair used to sign one request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Long-lived credentials with no session token.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// True when the credentials expire within the refresh window of `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expiration
            .is_some_and(|exp| exp - now < ChronoDuration::seconds(REFRESH_WINDOW_SECS))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Source of signing credentials.
#[async_trait]
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// Credentials to sign the next request with.
    async fn credentials(&self) -> Result<Credentials, CredentialsError>;
}

/// Fixed credentials from configuration or environment.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialsProvider for StaticProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        Ok(self.credentials.clone())
    }
}

/// Credentials document served by the instance metadata service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetadataCredentials {
    code: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

impl TryFrom<MetadataCredentials> for Credentials {
    type Error = CredentialsError;

    fn try_from(doc: MetadataCredentials) -> Result<Self, Self::Error> {
        if let Some(code) = doc.code.filter(|c| c != "Success") {
            return Err(CredentialsError::Rejected { code });
        }
        let access_key_id = doc
            .access_key_id
            .ok_or_else(|| CredentialsError::Malformed("missing AccessKeyId".into()))?;
        let secret_access_key = doc
            .secret_access_key
            .ok_or_else(|| CredentialsError::Malformed("missing SecretAccessKey".into()))?;

        Ok(Credentials {
            access_key_id,
            secret_access_key,
            session_token: doc.token,
            expiration: doc.expiration,
        })
    }
}

/// Credentials bound to the host's instance profile.
///
/// Uses IMDSv2 session tokens, falling back to IMDSv1 when the token endpoint
/// is unavailable.
#[derive(Debug)]
pub struct InstanceProfileProvider {
    client: reqwest::Client,
    endpoint: String,
    cached: ArcSwapOption<Credentials>,
}

impl InstanceProfileProvider {
    /// Create a provider against the given metadata endpoint (e.g., "http://169.254.169.254").
    pub fn new(endpoint: impl Into<String>) -> Result<Self, CredentialsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cached: ArcSwapOption::empty(),
        })
    }

    async fn session_token(&self) -> Option<String> {
        let result = self
            .client
            .put(format!("{}{}", self.endpoint, METADATA_TOKEN_PATH))
            .header(METADATA_TOKEN_TTL_HEADER, METADATA_TOKEN_TTL_SECS)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(response) => response.text().await.ok(),
            Err(e) => {
                tracing::debug!(error = %e, "IMDSv2 token unavailable, using IMDSv1");
                None
            }
        }
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<String, CredentialsError> {
        let mut request = self.client.get(format!("{}{}", self.endpoint, path));
        if let Some(token) = token {
            request = request.header(METADATA_TOKEN_HEADER, token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch(&self) -> Result<Credentials, CredentialsError> {
        let token = self.session_token().await;

        let roles = self.get(METADATA_ROLE_PATH, token.as_deref()).await?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or(CredentialsError::NoRole)?;

        let document = self
            .get(&format!("{METADATA_ROLE_PATH}{role}"), token.as_deref())
            .await?;
        let parsed: MetadataCredentials = serde_json::from_str(&document)
            .map_err(|e| CredentialsError::Malformed(e.to_string()))?;
        let credentials = Credentials::try_from(parsed)?;

        tracing::info!(
            role = %role,
            expiration = ?credentials.expiration,
            "Instance profile credentials refreshed"
        );
        Ok(credentials)
    }
}

#[async_trait]
impl CredentialsProvider for InstanceProfileProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialsError> {
        if let Some(cached) = self.cached.load_full() {
            if !cached.needs_refresh(Utc::now()) {
                return Ok((*cached).clone());
            }
        }

        let fresh = self.fetch().await?;
        self.cached.store(Some(Arc::new(fresh.clone())));
        Ok(fresh)
    }
}
