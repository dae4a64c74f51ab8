//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State (state.rs):
//!     Unbound → Listening → Stopped → Listening → …
//!
//! Shutdown (shutdown.rs):
//!     stop/restart → stop accepting → drain in-flight (grace period) → close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop the server held by the binary
//! ```
//!
//! # Design Decisions
//! - One serving generation at a time per server instance
//! - Graceful shutdown is canonical; the grace period bounds the drain
//! - Terminal only when the instance is dropped

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::Shutdown;
pub use state::ServerState;
