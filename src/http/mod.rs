//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing span with request ID)
//!     → auth.rs (Basic Auth gate, when configured)
//!     → request.rs (buffer body, capture CGI-keyed headers, normalize)
//!     → [routing resolves the upstream target]
//!     → [upstream signs and sends]
//!     → response.rs (relay, access log)
//!     → Send to client
//! ```

pub mod auth;
pub mod request;
pub mod response;
pub mod server;

pub use auth::BasicAuth;
pub use request::{InboundRequest, Method, NormalizedHeaders};
pub use server::HttpServer;
