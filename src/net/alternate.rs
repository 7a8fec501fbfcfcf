//! Alternate connection backed by reqwest.
//!
//! This is the counterpart of a platform HTTP stack: it takes the whole
//! request before anything goes on the wire, routes through a proxy itself
//! and needs proxy credentials pushed to it explicitly.
//!
//! # Quirk
//! The request is only fired by `send`. A request without a body still
//! needs an explicit `send(None)`; `get_response` before any send fails
//! with `ConnectionError::RequestNotSent`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::redirect::Policy;

use crate::config::Protocol;
use crate::net::connection::{
    Connection, ConnectionError, ConnectionId, ConnectionKind, ResponseHead, TunnelConfig,
};
use crate::net::head::{self, RequestHead};
use crate::net::tls::TlsContext;

pub struct AlternateConnection {
    id: ConnectionId,
    protocol: Protocol,
    host: String,
    port: u16,
    tls: Arc<TlsContext>,
    proxy: Option<TunnelConfig>,
    proxy_credentials: Option<(String, String)>,
    connected: bool,
    request: Option<RequestHead>,
    host_override: Option<String>,
    headers_done: bool,
    response: Option<reqwest::Response>,
}

impl AlternateConnection {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16, tls: Arc<TlsContext>) -> Self {
        Self {
            id: ConnectionId::new(),
            protocol,
            host: host.into(),
            port,
            tls,
            proxy: None,
            proxy_credentials: None,
            connected: false,
            request: None,
            host_override: None,
            headers_done: false,
            response: None,
        }
    }

    fn url(&self, path: &str) -> Result<reqwest::Url, ConnectionError> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        reqwest::Url::parse(&format!("{}://{}:{}{}", self.protocol, host, self.port, path))
            .map_err(|_| ConnectionError::InvalidPath(path.to_string()))
    }

    async fn build_client(&self) -> Result<reqwest::Client, ConnectionError> {
        let mut builder = reqwest::Client::builder().redirect(Policy::none());

        builder = match &self.proxy {
            Some(proxy) => {
                let mut p = reqwest::Proxy::all(format!("http://{}", proxy.authority()))?;
                if let Some((user, password)) = &self.proxy_credentials {
                    p = p.basic_auth(user, password);
                }
                builder.proxy(p)
            }
            None => builder.no_proxy(),
        };

        if let Some(path) = self.tls.cert_file() {
            let pem = tokio::fs::read(path).await?;
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }
        if let Some(path) = self.tls.ca_file() {
            let pem = tokio::fs::read(path).await?;
            for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl Connection for AlternateConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Alternate
    }

    /// Here the tunnel names the proxy to route through.
    fn set_tunnel(&mut self, tunnel: TunnelConfig) {
        self.proxy = Some(tunnel);
    }

    fn set_proxy_credentials(&mut self, user: &str, password: &str) {
        self.proxy_credentials = Some((user.to_string(), password.to_string()));
    }

    /// Resolves the target so name errors surface here; the socket opens on `send`.
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let lookup_host = match &self.proxy {
            Some(proxy) => (proxy.host.clone(), proxy.port),
            None => (self.host.clone(), self.port),
        };
        let mut addrs = tokio::net::lookup_host((lookup_host.0.as_str(), lookup_host.1)).await?;
        if addrs.next().is_none() {
            return Err(ConnectionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses for {}", lookup_host.0),
            )));
        }
        self.connected = true;
        Ok(())
    }

    fn put_request_line(&mut self, method: &str, path: &str) -> Result<(), ConnectionError> {
        if self.request.is_some() {
            return Err(ConnectionError::State("request line already written"));
        }
        let mut request = RequestHead::new(method, path)?;
        if let Some(host) = self.host_override.take() {
            request.set_host(host);
        }
        self.request = Some(request);
        Ok(())
    }

    fn put_header(&mut self, name: &str, value: &str) -> Result<(), ConnectionError> {
        if self.headers_done {
            return Err(ConnectionError::State("headers must follow the request line"));
        }
        self.request
            .as_mut()
            .ok_or(ConnectionError::State("headers must follow the request line"))?
            .append(name, value)
    }

    fn set_host_header(&mut self, value: &str) {
        match self.request.as_mut() {
            Some(request) => request.set_host(value),
            None => self.host_override = Some(value.to_string()),
        }
    }

    async fn end_headers(&mut self) -> Result<(), ConnectionError> {
        if self.request.is_none() {
            return Err(ConnectionError::State("no request line"));
        }
        self.headers_done = true;
        Ok(())
    }

    async fn send(&mut self, data: Option<&[u8]>) -> Result<(), ConnectionError> {
        if !self.connected || !self.headers_done {
            return Err(ConnectionError::State("send before end_headers"));
        }
        if self.response.is_some() {
            return Err(ConnectionError::State("request already sent"));
        }
        let request = self
            .request
            .as_ref()
            .ok_or(ConnectionError::State("no request line"))?;
        let headers = request.header_map()?;
        let url = self.url(&request.uri.to_string())?;
        let client = self.build_client().await?;

        tracing::debug!(
            connection_id = %self.id,
            method = %request.method,
            path = %request.uri,
            proxied = self.proxy.is_some(),
            "Firing alternate request"
        );

        let mut builder = client.request(request.method.clone(), url).headers(headers);
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            builder = builder.body(data.to_vec());
        }
        let response = builder.send().await?;
        self.response = Some(response);
        Ok(())
    }

    async fn get_response(&mut self) -> Result<ResponseHead, ConnectionError> {
        let response = self.response.as_ref().ok_or(ConnectionError::RequestNotSent)?;
        let status = response.status();

        let is_head = self
            .request
            .as_ref()
            .map(|r| r.method == reqwest::Method::HEAD)
            .unwrap_or(false);
        let length = if is_head || status.as_u16() == 204 || status.as_u16() == 304 {
            Some(0)
        } else {
            response.content_length()
        };

        Ok(head::response_head(status, response.headers(), response.extensions(), length))
    }

    async fn read_body(&mut self, length: Option<u64>) -> Result<Bytes, ConnectionError> {
        let response = self.response.take().ok_or(ConnectionError::RequestNotSent)?;
        let mut body = response.bytes().await?;
        if let Some(n) = length.and_then(|n| usize::try_from(n).ok()) {
            body.truncate(n);
        }
        Ok(body)
    }

    async fn close(&mut self) {
        self.response = None;
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> AlternateConnection {
        AlternateConnection::new(Protocol::Http, "127.0.0.1", 10000, Arc::new(TlsContext::default()))
    }

    #[tokio::test]
    async fn response_requires_send() {
        let mut conn = connection();
        conn.connect().await.unwrap();
        conn.put_request_line("GET", "/devstoreaccount1").unwrap();
        conn.end_headers().await.unwrap();
        assert!(matches!(
            conn.get_response().await,
            Err(ConnectionError::RequestNotSent)
        ));
        conn.close().await;
    }

    #[test]
    fn url_brackets_ipv6_hosts() {
        let conn = AlternateConnection::new(Protocol::Https, "::1", 8443, Arc::new(TlsContext::default()));
        assert_eq!(conn.url("/x?y=1").unwrap().as_str(), "https://[::1]:8443/x?y=1");
    }

    #[test]
    fn rejects_bad_tokens() {
        let mut conn = connection();
        assert!(matches!(
            conn.put_request_line("G E T", "/"),
            Err(ConnectionError::InvalidMethod(_))
        ));
        conn.put_request_line("GET", "/").unwrap();
        assert!(matches!(
            conn.put_header("x-ms-meta", "a\nb"),
            Err(ConnectionError::InvalidHeader(_))
        ));
    }
}
