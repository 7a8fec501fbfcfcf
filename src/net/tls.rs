//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Build the rustls client configuration once per client
//! - Load the client certificate (chain + key) from the configured PEM file
//! - Extend the bundled web PKI roots with configured trust anchors

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio::sync::OnceCell;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::net::connection::ConnectionError;

/// Lazily built TLS client configuration shared by every HTTPS connection of a client.
#[derive(Debug, Default)]
pub struct TlsContext {
    cert_file: Option<PathBuf>,
    ca_file: Option<PathBuf>,
    config: OnceCell<Arc<ClientConfig>>,
}

impl TlsContext {
    pub fn new(cert_file: Option<PathBuf>, ca_file: Option<PathBuf>) -> Self {
        Self {
            cert_file,
            ca_file,
            config: OnceCell::new(),
        }
    }

    pub fn cert_file(&self) -> Option<&Path> {
        self.cert_file.as_deref()
    }

    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// The rustls configuration, built on first use.
    pub async fn client_config(&self) -> Result<Arc<ClientConfig>, ConnectionError> {
        self.config
            .get_or_try_init(|| async {
                build_client_config(self.cert_file.as_deref(), self.ca_file.as_deref())
            })
            .await
            .cloned()
    }

    /// Run the TLS handshake for `host` over an established stream.
    pub async fn handshake(&self, host: &str, stream: TcpStream) -> Result<TlsStream<TcpStream>, ConnectionError> {
        let config = self.client_config().await?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ConnectionError::Tls(format!("Invalid server name '{}': {}", host, e)))?;

        let stream = TlsConnector::from(config)
            .connect(server_name, stream)
            .await
            .map_err(|e| ConnectionError::Tls(format!("Handshake with '{}' failed: {}", host, e)))?;

        tracing::debug!(host = %host, "TLS handshake complete");
        Ok(stream)
    }
}

fn open_pem(path: &Path) -> Result<BufReader<File>, ConnectionError> {
    let file = File::open(path).map_err(|e| {
        ConnectionError::Tls(format!("Failed to read PEM file '{}': {}", path.display(), e))
    })?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConnectionError> {
    let certs = rustls_pemfile::certs(&mut open_pem(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConnectionError::Tls(format!("Failed to parse certificate PEM: {}", e)))?;

    if certs.is_empty() {
        return Err(ConnectionError::Tls(format!(
            "No certificates found in '{}'",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConnectionError> {
    rustls_pemfile::private_key(&mut open_pem(path)?)
        .map_err(|e| ConnectionError::Tls(format!("Failed to parse private key PEM: {}", e)))?
        .ok_or_else(|| {
            ConnectionError::Tls(format!("No private key found in '{}'", path.display()))
        })
}

/// Build a rustls client configuration.
///
/// `cert_file` must hold both the certificate chain and its private key.
pub fn build_client_config(
    cert_file: Option<&Path>,
    ca_file: Option<&Path>,
) -> Result<Arc<ClientConfig>, ConnectionError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca_file) = ca_file {
        for cert in load_certs(ca_file)? {
            root_store
                .add(cert)
                .map_err(|e| ConnectionError::Tls(format!("Failed to add root certificate: {}", e)))?;
        }
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectionError::Tls(e.to_string()))?
        .with_root_certificates(root_store);

    let config = match cert_file {
        Some(path) => {
            let chain = load_certs(path)?;
            let key = load_private_key(path)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| ConnectionError::Tls(format!("Invalid client certificate: {}", e)))?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}
