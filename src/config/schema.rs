//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for an [`HttpClient`](crate::http::HttpClient).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Label of the service this client talks to (used in logs and metrics).
    pub service: String,

    /// Protocol used when a request does not override it.
    pub protocol: Protocol,

    /// PEM file holding the client certificate chain and private key.
    pub cert_file: Option<PathBuf>,

    /// Account credentials carried for higher layers.
    pub credentials: Credentials,

    /// Optional proxy used for CONNECT tunnelling.
    pub proxy: Option<ProxySettings>,

    /// Connection implementation selection.
    pub connection: ConnectionConfig,

    /// TLS trust settings.
    pub tls: TlsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service: "default".to_string(),
            protocol: Protocol::Https,
            cert_file: None,
            credentials: Credentials::default(),
            proxy: None,
            connection: ConnectionConfig::default(),
            tls: TlsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Wire protocol of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    /// Port used when the request names none.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(other.to_string()),
        }
    }
}

/// Account credentials.
///
/// The dispatcher never reads these; request signing layers built on top of
/// the client do.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Credentials {
    /// Storage account name.
    pub account_name: Option<String>,

    /// Storage or service bus access key.
    pub account_key: Option<String>,

    /// Service bus namespace.
    pub service_namespace: Option<String>,

    /// Service bus issuer.
    pub issuer: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("service_namespace", &self.service_namespace)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Proxy server used for HTTP CONNECT tunnelling.
#[derive(Clone, Deserialize, Serialize)]
pub struct ProxySettings {
    /// Address of the proxy (e.g., "192.168.0.100").
    pub host: String,

    /// Port of the proxy (e.g., 6000).
    pub port: u16,

    /// User for proxy authorization.
    #[serde(default)]
    pub user: Option<String>,

    /// Password for proxy authorization.
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxySettings {
    /// Basic credentials, present only when both user and password are set.
    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Which connection implementation dispatches requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionBackend {
    /// Alternate stack on Windows builds, standard stack elsewhere.
    #[default]
    Auto,
    /// Built-in HTTP/1.1 connections.
    Standard,
    /// reqwest-backed connection.
    Alternate,
}

impl ConnectionBackend {
    /// Resolve `Auto` against the build target.
    pub fn resolve(self) -> ConnectionBackend {
        match self {
            ConnectionBackend::Auto if cfg!(windows) => ConnectionBackend::Alternate,
            ConnectionBackend::Auto => ConnectionBackend::Standard,
            other => other,
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConnectionConfig {
    pub backend: ConnectionBackend,
}

/// TLS trust configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Extra PEM trust anchors added to the bundled web PKI roots.
    pub ca_file: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_https() {
        let config = ClientConfig::default();
        assert_eq!(config.protocol, Protocol::Https);
        assert!(config.proxy.is_none());
        assert_eq!(config.connection.backend, ConnectionBackend::Auto);
    }

    #[test]
    fn protocol_ports() {
        assert_eq!(Protocol::Http.default_port(), 80);
        assert_eq!(Protocol::Https.default_port(), 443);
        assert_eq!("HTTP".parse::<Protocol>(), Ok(Protocol::Http));
        assert!("ftp".parse::<Protocol>().is_err());
    }

    #[test]
    fn basic_credentials_need_both_parts() {
        let mut proxy = ProxySettings {
            host: "10.0.0.1".into(),
            port: 3128,
            user: Some("user".into()),
            password: None,
        };
        assert!(proxy.basic_credentials().is_none());

        proxy.password = Some("pass".into());
        assert_eq!(proxy.basic_credentials(), Some(("user", "pass")));
    }

    #[test]
    fn debug_redacts_secrets() {
        let proxy = ProxySettings {
            host: "10.0.0.1".into(),
            port: 3128,
            user: Some("user".into()),
            password: Some("hunter2".into()),
        };
        let creds = Credentials {
            account_key: Some("c2VjcmV0".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", proxy).contains("hunter2"));
        assert!(!format!("{:?}", creds).contains("c2VjcmV0"));
    }

    #[test]
    fn auto_backend_resolves_per_target() {
        let resolved = ConnectionBackend::Auto.resolve();
        if cfg!(windows) {
            assert_eq!(resolved, ConnectionBackend::Alternate);
        } else {
            assert_eq!(resolved, ConnectionBackend::Standard);
        }
        assert_eq!(ConnectionBackend::Alternate.resolve(), ConnectionBackend::Alternate);
    }
}
