//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MockConfig (validated)
//!     → MockServer::from_config (listener, TLS, built-ins, seeds)
//!
//! On file change (watcher.rs):
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → plan_reload compares against the applied config
//!     → changed [mock] section re-applied to the running server
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Reload only touches state that is live without restart (messages,
//!   headers, mutation flag); listener settings need a process restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ListenerConfig, LogFormat, MessageConfig, MockConfig, MockSettings, ObservabilityConfig,
    ShutdownConfig, TlsConfig, UpdateMethod,
};
pub use validation::ValidationError;
pub use watcher::{plan_reload, ConfigWatcher, ReloadPlan};
