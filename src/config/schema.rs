//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mock server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Root configuration for the mock server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MockConfig {
    /// Listener configuration (bind address, retry, TLS).
    pub listener: ListenerConfig,

    /// Served messages, headers and built-in handler settings.
    pub mock: MockSettings,

    /// Shutdown behaviour on stop/restart.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (`"0.0.0.0:8080"`, `":8080"` or `"8080"`).
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Bind attempts before a (re)start gives up.
    pub bind_attempts: u32,

    /// Pause between bind attempts in milliseconds.
    pub bind_retry_delay_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":8080".to_string(),
            tls: None,
            bind_attempts: 100,
            bind_retry_delay_ms: 20,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Method the update built-in answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Put,
    Post,
}

impl UpdateMethod {
    pub fn method(&self) -> Method {
        match self {
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Post => Method::POST,
        }
    }
}

/// Mock behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MockSettings {
    /// Allow the update built-in to write messages.
    pub mutation_enabled: bool,

    /// `put` or `post`.
    pub update_method: UpdateMethod,

    /// Maximum accepted update body in bytes.
    pub max_body_bytes: usize,

    /// Headers applied to every served message.
    pub headers: BTreeMap<String, String>,

    /// Messages registered at startup.
    pub messages: Vec<MessageConfig>,
}

impl Default for MockSettings {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            mutation_enabled: true,
            update_method: UpdateMethod::Put,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            headers,
            messages: Vec::new(),
        }
    }
}

/// A message seeded from configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageConfig {
    /// Path the message is served under (normalized on registration).
    pub path: String,

    /// Body returned verbatim.
    pub body: String,

    /// Status code (default: 200).
    #[serde(default = "default_status")]
    pub status: u16,
}

fn default_status() -> u16 {
    200
}

/// Shutdown configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time in-flight requests get to finish on stop/restart, in milliseconds.
    pub grace_period_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 3000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
