//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (management calls):
//!     pattern string → pattern.rs (compile to anchored regex, reject malformed)
//!     (pattern, methods, handler) → handler.rs (HandlerRoute)
//!
//! Restart:
//!     custom HandlerRoute[] (newest first) + built-in HandlerRoute[]
//!     → table.rs (RoutingEngine::compile)
//!     → Freeze as the engine of the next server generation
//!
//! Request:
//!     method + decoded path → RoutingEngine::find → handler | 405 | 404
//! ```
//!
//! # Design Decisions
//! - Tables are compiled on restart, immutable while serving
//! - First registration wins (custom handlers shadow built-ins)
//! - Deterministic: same table and request always pick the same route

pub mod handler;
pub mod pattern;
pub mod table;

pub use handler::{HandlerFuture, HandlerRoute, MethodSet, RouteHandler};
pub use pattern::{decode_path, PathParams, PatternError, RoutePattern};
pub use table::{RouteMatch, RouteOrigin, RoutingEngine};
