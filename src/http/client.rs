//! Request dispatcher.
//!
//! # Responsibilities
//! - Resolve protocol, target host and port for each request
//! - Open a connection, direct or through a CONNECT tunnel
//! - Write request line, headers and body, then read and normalize the response
//! - Turn status >= 300 into `DispatchError::RequestFailed`
//!
//! # Design Decisions
//! - One connection per dispatch, closed exactly once on every path
//! - Client state is read-only during dispatch, so a client can be shared

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::config::{ClientConfig, Credentials, Protocol, ProxySettings};
use crate::http::error::{DispatchError, HttpError};
use crate::http::request::HttpRequest;
use crate::http::response::{normalize_headers, HttpResponse};
use crate::http::USER_AGENT;
use crate::net::tunnel::{self, PROXY_AUTHORIZATION};
use crate::net::{Connection, Connector, PlatformConnector, TunnelConfig};
use crate::observability::metrics;

/// Where a request is ultimately going.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    protocol: Protocol,
    host: String,
    port: u16,
}

impl Target {
    fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct HttpClient {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
}

impl HttpClient {
    /// Client using the connection backend named in `config`.
    pub fn new(config: ClientConfig) -> Self {
        let connector = Arc::new(PlatformConnector::from_config(&config));
        Self { config, connector }
    }

    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    /// Route subsequent requests through `host:port`. Not validated.
    pub fn set_proxy(
        &mut self,
        host: impl Into<String>,
        port: u16,
        user: Option<String>,
        password: Option<String>,
    ) {
        self.config.proxy = Some(ProxySettings {
            host: host.into(),
            port,
            user,
            password,
        });
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.config.credentials
    }

    fn target(&self, request: &HttpRequest) -> Result<Target, DispatchError> {
        let protocol = match &request.protocol {
            Some(p) => p
                .parse::<Protocol>()
                .map_err(|_| DispatchError::InvalidProtocol(p.clone()))?,
            None => self.config.protocol,
        };
        Ok(Target {
            protocol,
            host: request.host.clone(),
            port: request.port.unwrap_or_else(|| protocol.default_port()),
        })
    }

    fn tunnelled_standard(&self, conn: &dyn Connection) -> bool {
        self.config.proxy.is_some() && conn.kind().is_standard()
    }

    /// Open and connect a connection for `request`.
    ///
    /// Standard connections go to the proxy and tunnel to the target; the
    /// alternate connection goes to the target and is told about the proxy.
    pub async fn get_connection(&self, request: &HttpRequest) -> Result<Box<dyn Connection>, DispatchError> {
        let target = self.target(request)?;
        let kind = self.connector.kind(target.protocol);

        let mut conn = match &self.config.proxy {
            Some(proxy) => {
                let (mut conn, tunnel) = if kind.is_standard() {
                    (
                        self.connector.open(target.protocol, &proxy.host, proxy.port),
                        TunnelConfig::new(target.host.clone(), target.port),
                    )
                } else {
                    (
                        self.connector.open(target.protocol, &target.host, target.port),
                        TunnelConfig::new(proxy.host.clone(), proxy.port),
                    )
                };
                let tunnel = match proxy.basic_credentials() {
                    Some((user, password)) => {
                        tunnel.with_header(PROXY_AUTHORIZATION, tunnel::basic_authorization(user, password))
                    }
                    None => tunnel,
                };
                conn.set_tunnel(tunnel);
                conn
            }
            None => self.connector.open(target.protocol, &target.host, target.port),
        };

        if let Err(e) = conn.connect().await {
            tracing::warn!(
                connection_id = %conn.id(),
                host = %target.host,
                port = target.port,
                error = %e,
                "Connect failed"
            );
            conn.close().await;
            metrics::record_connection_error(kind);
            return Err(e.into());
        }

        tracing::debug!(
            connection_id = %conn.id(),
            connection = %kind,
            target = %target.authority(),
            proxied = self.config.proxy.is_some(),
            "Connection ready"
        );
        Ok(conn)
    }

    /// Write the header section: Host override when tunnelling, the request's
    /// non-empty headers, then `User-Agent`.
    pub async fn send_request_headers(
        &self,
        conn: &mut dyn Connection,
        request: &HttpRequest,
    ) -> Result<(), DispatchError> {
        if self.tunnelled_standard(conn) {
            let target = self.target(request)?;
            conn.set_host_header(&target.authority());
        }

        for (name, value) in &request.headers {
            match value.as_deref() {
                Some(value) if !value.is_empty() => conn.put_header(name, value)?,
                _ => {}
            }
        }
        conn.put_header("User-Agent", USER_AGENT)?;
        conn.end_headers().await?;
        Ok(())
    }

    /// Send the body. Without one, only the alternate connection gets an empty send.
    pub async fn send_request_body(
        &self,
        conn: &mut dyn Connection,
        body: Option<&[u8]>,
    ) -> Result<(), DispatchError> {
        match body {
            Some(data) if !data.is_empty() => conn.send(Some(data)).await?,
            _ if !conn.kind().is_standard() => conn.send(None).await?,
            _ => {}
        }
        Ok(())
    }

    /// Dispatch `request` and return the normalized response.
    pub async fn perform_request(&self, request: &HttpRequest) -> Result<HttpResponse, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            method = %request.method,
            host = %request.host,
            path = %request.path,
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, DispatchError> {
        let start = Instant::now();
        let mut conn = self.get_connection(request).await?;
        let kind = conn.kind();

        let result = self.exchange(conn.as_mut(), request).await;
        conn.close().await;

        match &result {
            Ok(response) => {
                metrics::record_dispatch(&request.method, response.status, kind, start);
                tracing::debug!(status = response.status, "Request completed");
            }
            Err(DispatchError::RequestFailed(err)) => {
                metrics::record_dispatch(&request.method, err.status, kind, start);
                tracing::debug!(status = err.status, reason = %err.reason, "Request failed");
            }
            Err(e) => {
                metrics::record_connection_error(kind);
                tracing::warn!(error = %e, "Dispatch error");
            }
        }
        result
    }

    async fn exchange(
        &self,
        conn: &mut dyn Connection,
        request: &HttpRequest,
    ) -> Result<HttpResponse, DispatchError> {
        conn.put_request_line(&request.method, &request.path)?;

        if !conn.kind().is_standard() {
            if let Some(proxy) = &self.config.proxy {
                if let Some(user) = proxy.user.as_deref().filter(|u| !u.is_empty()) {
                    conn.set_proxy_credentials(user, proxy.password.as_deref().unwrap_or_default());
                }
            }
        }

        self.send_request_headers(conn, request).await?;
        self.send_request_body(conn, request.body.as_deref()).await?;

        let head = conn.get_response().await?;
        let headers = normalize_headers(head.headers);
        let body = match head.length {
            Some(0) => None,
            length => Some(conn.read_body(length).await?),
        };

        if head.status >= 300 {
            return Err(DispatchError::RequestFailed(HttpError {
                status: head.status,
                reason: head.reason,
                headers,
                body,
            }));
        }

        Ok(HttpResponse {
            status: head.status,
            reason: head.reason,
            headers,
            body,
        })
    }
}
