//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", list(.0))]
    Validation(Vec<ValidationError>),
}

fn list(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        service = %config.service,
        protocol = %config.protocol,
        proxy = config.proxy.is_some(),
        backend = ?config.connection.backend,
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use crate::config::schema::{ConnectionBackend, Protocol};

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
service = "blob"
protocol = "http"

[credentials]
account_name = "devstoreaccount1"
account_key = "a2V5"

[proxy]
host = "proxy.internal"
port = 3128
user = "alice"
password = "secret"

[connection]
backend = "alternate"

[observability]
log_level = "debug"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.service, "blob");
        assert_eq!(config.protocol, Protocol::Http);
        assert_eq!(config.credentials.account_name.as_deref(), Some("devstoreaccount1"));
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.port, 3128);
        assert_eq!(proxy.basic_credentials(), Some(("alice", "secret")));
        assert_eq!(config.connection.backend, ConnectionBackend::Alternate);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.service, "default");
    }

    #[test]
    fn rejects_unknown_protocol() {
        let err = parse_config("protocol = \"gopher\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reports_validation_errors() {
        let err = parse_config("[proxy]\nhost = \"\"\nport = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {}", other),
        }
    }

    #[test]
    fn validation_message_lists_every_problem() {
        let err = parse_config("service = \"\"\n[proxy]\nhost = \"p\"\nport = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config: service label must not be empty; proxy.port must be non-zero"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/no/such/client.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
