//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! method + resolved target + NormalizedHeaders + body
//!     → client.rs (build URL, resolve credentials, sign, send)
//!     → UpstreamResponse (status, headers, buffered body)
//! ```

pub mod client;

pub use client::{SigningClient, UpstreamResponse, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
