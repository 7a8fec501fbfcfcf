//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check proxy settings form a usable group
//! - Check referenced certificate files exist
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is handed to the client

use std::path::Path;

use thiserror::Error;

use crate::config::schema::ClientConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service label must not be empty")]
    EmptyService,
    #[error("proxy.host must not be empty")]
    EmptyProxyHost,
    #[error("proxy.port must be non-zero")]
    ZeroProxyPort,
    /// Proxy user and password must be given together.
    #[error("proxy.user and proxy.password must be set together")]
    IncompleteProxyCredentials,
    #[error("{field} points to a missing file: {path}")]
    MissingFile { field: &'static str, path: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.trim().is_empty() {
        errors.push(ValidationError::EmptyService);
    }

    if let Some(proxy) = &config.proxy {
        if proxy.host.trim().is_empty() {
            errors.push(ValidationError::EmptyProxyHost);
        }
        if proxy.port == 0 {
            errors.push(ValidationError::ZeroProxyPort);
        }
        if proxy.user.is_some() != proxy.password.is_some() {
            errors.push(ValidationError::IncompleteProxyCredentials);
        }
    }

    check_file(&mut errors, "cert_file", config.cert_file.as_deref());
    check_file(&mut errors, "tls.ca_file", config.tls.ca_file.as_deref());

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_file(errors: &mut Vec<ValidationError>, field: &'static str, path: Option<&Path>) {
    if let Some(path) = path {
        if !path.is_file() {
            errors.push(ValidationError::MissingFile {
                field,
                path: path.display().to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProxySettings;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ClientConfig::default();
        config.service = "  ".into();
        config.proxy = Some(ProxySettings {
            host: String::new(),
            port: 0,
            user: Some("user".into()),
            password: None,
        });
        config.cert_file = Some("/definitely/not/here.pem".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::EmptyService));
        assert!(errors.contains(&ValidationError::EmptyProxyHost));
        assert!(errors.contains(&ValidationError::ZeroProxyPort));
        assert!(errors.contains(&ValidationError::IncompleteProxyCredentials));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingFile { field: "cert_file", .. })));
    }

    #[test]
    fn proxy_without_credentials_is_valid() {
        let mut config = ClientConfig::default();
        config.proxy = Some(ProxySettings {
            host: "proxy.internal".into(),
            port: 8080,
            user: None,
            password: None,
        });
        assert!(validate_config(&config).is_ok());
    }
}
