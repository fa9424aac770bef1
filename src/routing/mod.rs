//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (path, query)
//!     → prefix.rs (join path and query, enforce configured prefix)
//!     → upstream request target
//! ```
//!
//! There is exactly one upstream, so routing reduces to deciding which path
//! on it a request may reach.

pub mod prefix;

pub use prefix::PathResolver;
