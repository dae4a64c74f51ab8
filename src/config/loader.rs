//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::MockConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<MockConfig, ConfigError> {
    let config: MockConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MockConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::UpdateMethod;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, ":8080");
        assert_eq!(config.listener.bind_attempts, 100);
        assert_eq!(config.listener.bind_retry_delay_ms, 20);
        assert!(config.mock.mutation_enabled);
        assert_eq!(config.mock.headers["Content-Type"], "application/json");
    }

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[listener]
bind_address = "127.0.0.1:9999"

[mock]
mutation_enabled = false
update_method = "post"

[mock.headers]
"X-Mock" = "yes"

[[mock.messages]]
path = "/hello"
body = '{{"message":"Hello, world!"}}'

[[mock.messages]]
path = "gone"
body = "bye"
status = 410

[shutdown]
grace_period_ms = 250
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert!(!config.mock.mutation_enabled);
        assert_eq!(config.mock.update_method, UpdateMethod::Post);
        assert_eq!(config.mock.headers.len(), 1);
        assert_eq!(config.mock.messages.len(), 2);
        assert_eq!(config.mock.messages[0].status, 200);
        assert_eq!(config.mock.messages[0].body, r#"{"message":"Hello, world!"}"#);
        assert_eq!(config.mock.messages[1].status, 410);
        assert_eq!(config.shutdown.grace_period_ms, 250);
    }

    #[test]
    fn reports_every_validation_error() {
        let err = parse_config(
            r#"
[listener]
bind_address = ""
bind_attempts = 0

[[mock.messages]]
path = "x"
body = "y"
status = 7
"#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            load_config(Path::new("/nonexistent/live-mock.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
