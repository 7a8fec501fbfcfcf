//! Connection factory.
//!
//! The dispatcher asks the connector which kind of connection a protocol maps
//! to before it decides where to connect, then opens one connection per request.

use std::sync::Arc;

use crate::config::{ClientConfig, ConnectionBackend, Protocol};
use crate::net::alternate::AlternateConnection;
use crate::net::connection::{Connection, ConnectionKind};
use crate::net::standard::StandardConnection;
use crate::net::tls::TlsContext;

/// Opens connections for the dispatcher.
pub trait Connector: Send + Sync {
    /// The kind `open` will return for `protocol`.
    fn kind(&self, protocol: Protocol) -> ConnectionKind;

    /// A fresh, unconnected connection to `host:port`.
    fn open(&self, protocol: Protocol, host: &str, port: u16) -> Box<dyn Connection>;
}

/// Picks the built-in or the alternate implementation from the configured backend.
#[derive(Debug)]
pub struct PlatformConnector {
    backend: ConnectionBackend,
    tls: Arc<TlsContext>,
}

impl PlatformConnector {
    pub fn new(backend: ConnectionBackend, tls: Arc<TlsContext>) -> Self {
        Self {
            backend: backend.resolve(),
            tls,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let tls = TlsContext::new(config.cert_file.clone(), config.tls.ca_file.clone());
        Self::new(config.connection.backend, Arc::new(tls))
    }

    pub fn backend(&self) -> ConnectionBackend {
        self.backend
    }
}

impl Connector for PlatformConnector {
    fn kind(&self, protocol: Protocol) -> ConnectionKind {
        match (self.backend, protocol) {
            (ConnectionBackend::Alternate, _) => ConnectionKind::Alternate,
            (_, Protocol::Http) => ConnectionKind::Http,
            (_, Protocol::Https) => ConnectionKind::Https,
        }
    }

    fn open(&self, protocol: Protocol, host: &str, port: u16) -> Box<dyn Connection> {
        match self.kind(protocol) {
            ConnectionKind::Alternate => Box::new(AlternateConnection::new(
                protocol,
                host,
                port,
                Arc::clone(&self.tls),
            )),
            ConnectionKind::Https => Box::new(StandardConnection::https(host, port, Arc::clone(&self.tls))),
            ConnectionKind::Http => Box::new(StandardConnection::http(host, port)),
        }
    }
}
