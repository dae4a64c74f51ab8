//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server generation, graceful shutdown handle)
//!     → Axum fallback → RoutingEngine (custom handlers, then built-ins)
//!     → builtin.rs (serve / update / preflight against the registry)
//!     → response.rs (stored message + headers, plain-text errors)
//!     → Send to client
//! ```

pub mod builtin;
pub mod response;
pub mod server;

pub use builtin::{BuiltinOptions, BUILTIN_PATTERN};
pub use server::{MockServer, ServerOptions};
