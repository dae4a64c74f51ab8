//! Response registry subsystem.
//!
//! # Data Flow
//! ```text
//! Management calls / update built-in
//!     → messages.rs (normalize path, store or delete entry)
//!     → headers.rs (set or delete response header)
//!
//! Serve built-in (every request)
//!     → messages.rs lookup → headers.rs snapshot → response
//! ```
//!
//! # Design Decisions
//! - Contents change without a restart; every request reads the live state
//! - The raw maps are never exposed, only the operations on them
//! - Serving reads take no global lock (sharded map + header snapshot)

pub mod headers;
pub mod messages;

pub use headers::{HeaderError, HeaderSet};
pub use messages::{normalize_path, ResponseEntry, ResponseRegistry};
