//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! BindAddress
//!     → listener.rs (bind with bounded retry, release)
//!     → tls.rs (optional certificate/key loading)
//!     → Hand off to the serving engine (http::server)
//! ```
//!
//! # Design Decisions
//! - Exactly one listener per server instance
//! - Bind failures during restart are retried, not surfaced immediately
//! - TLS is optional and applied when the server is (re)started

pub mod listener;
pub mod tls;

pub use listener::{acquire, release, BindAddress, BindPolicy, Listener, ListenerError};
pub use tls::TlsMaterial;
