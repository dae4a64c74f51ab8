//! Runtime-mutable mock HTTP server library.
//!
//! Register the body and status returned for any path, override paths with
//! custom handlers, and restart the server in place to pick up routing changes.
//!
//! ```no_run
//! # async fn demo() -> Result<(), live_mock::ServerError> {
//! use live_mock::MockServer;
//!
//! let server = MockServer::bind(":8080").await?;
//! server.set_message("hello", r#"{"message":"Hello, world!"}"#);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::MockConfig;
pub use error::{RestartPhase, ServerError};
pub use http::{MockServer, ServerOptions};
pub use lifecycle::ServerState;
pub use routing::{MethodSet, PathParams, RouteHandler};
