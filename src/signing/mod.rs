//! Request signing subsystem.
//!
//! # Data Flow
//! ```text
//! CredentialsProvider (static pair | instance profile)
//!     → credentials.rs (resolve, cache until near expiry)
//!     → sigv4.rs (string to sign, signature, headers)
//!         → canonical.rs (canonical URI, query, headers)
//! ```
//!
//! # Design Decisions
//! - Signing is recomputed for every request; nothing about a signature is cached
//! - The signer is pure; time and credentials are passed in
//! - Providers are selected once at startup and shared read-only

pub mod canonical;
pub mod credentials;
pub mod sigv4;

pub use credentials::{
    Credentials, CredentialsError, CredentialsProvider, InstanceProfileProvider, StaticProvider,
};
pub use sigv4::{sign, SignableRequest, SigningOutput, SigningScope};

use std::sync::Arc;

use crate::config::ProxyConfig;

/// Pick the credentials provider for a loaded configuration.
///
/// A complete static pair wins; otherwise credentials come from the
/// instance profile.
pub fn provider_from_config(
    config: &ProxyConfig,
) -> Result<Arc<dyn CredentialsProvider>, CredentialsError> {
    match (&config.aws_access_key, &config.aws_secret_access_key) {
        (Some(access_key), Some(secret_key)) => {
            let mut credentials = Credentials::new(access_key, secret_key);
            credentials.session_token = config.aws_session_token.clone();
            tracing::info!(access_key_id = %access_key, "Using static signing credentials");
            Ok(Arc::new(StaticProvider::new(credentials)))
        }
        (access_key, secret_key) => {
            if access_key.is_some() || secret_key.is_some() {
                tracing::warn!("Incomplete static key pair; falling back to instance profile credentials");
            }
            tracing::info!(
                endpoint = %config.instance_metadata_endpoint,
                "Using instance profile signing credentials"
            );
            Ok(Arc::new(InstanceProfileProvider::new(
                config.instance_metadata_endpoint.clone(),
            )?))
        }
    }
}
