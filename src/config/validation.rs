//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts > 0, status codes, body limit)
//! - Check header names/values and log levels before they reach the server
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MockConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use axum::http::header::{HeaderName, HeaderValue};

use crate::config::schema::MockConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &MockConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if listener.bind_attempts == 0 {
        errors.push(ValidationError::new("listener.bind_attempts", "must be at least 1"));
    }
    if let Some(tls) = &listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    let mock = &config.mock;
    if mock.max_body_bytes == 0 {
        errors.push(ValidationError::new("mock.max_body_bytes", "must be greater than 0"));
    }
    for (name, value) in &mock.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("mock.headers.{name}"),
                "invalid header name",
            ));
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                format!("mock.headers.{name}"),
                "invalid header value",
            ));
        }
    }
    for (i, message) in mock.messages.iter().enumerate() {
        if !(100..=999).contains(&message.status) {
            errors.push(ValidationError::new(
                format!("mock.messages[{i}].status"),
                format!("{} is not a valid HTTP status", message.status),
            ));
        }
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level `{}`", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{MessageConfig, TlsConfig};

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&MockConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = MockConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: " ".into(),
        });
        config.mock.headers.insert("bad header".into(), "x".into());
        config.mock.messages.push(MessageConfig {
            path: "/x".into(),
            body: String::new(),
            status: 1000,
        });
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.tls.cert_path",
                "listener.tls.key_path",
                "mock.headers.bad header",
                "mock.messages[0].status",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = MockConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
