//! Built-in HTTP/1.1 connections (plain and TLS) driven by hyper.
//!
//! # Responsibilities
//! - Open the TCP stream (to the target, or to the proxy when tunnelling)
//! - Run the CONNECT handshake, then TLS for the `Https` kind
//! - Hand the stream to a hyper HTTP/1 client connection
//! - Hold the request head until `end_headers`, then stream the body through `send`

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::{Body, Frame, Incoming, SizeHint};
use hyper::client::conn::http1;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Protocol;
use crate::net::connection::{
    Connection, ConnectionError, ConnectionId, ConnectionKind, ResponseHead, TunnelConfig,
};
use crate::net::head::{self, RequestHead};
use crate::net::stream::MaybeTlsStream;
use crate::net::tls::TlsContext;
use crate::net::tunnel;

type PendingResponse = Pin<Box<dyn Future<Output = hyper::Result<Response<Incoming>>> + Send>>;

/// Request body fed chunk by chunk from `send`.
#[derive(Debug)]
pub struct OutgoingBody {
    chunks: Option<mpsc::Receiver<Bytes>>,
    length: Option<u64>,
}

impl OutgoingBody {
    fn empty() -> Self {
        Self {
            chunks: None,
            length: Some(0),
        }
    }

    fn channel(length: Option<u64>) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(4);
        (
            tx,
            Self {
                chunks: Some(rx),
                length,
            },
        )
    }
}

impl Body for OutgoingBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        match self.chunks.as_mut() {
            Some(rx) => rx.poll_recv(cx).map(|chunk| chunk.map(|data| Ok(Frame::data(data)))),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.chunks.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        match self.length {
            Some(n) => SizeHint::with_exact(n),
            None => SizeHint::default(),
        }
    }
}

pub struct StandardConnection {
    id: ConnectionId,
    kind: ConnectionKind,
    host: String,
    port: u16,
    tls: Option<Arc<TlsContext>>,
    tunnel: Option<TunnelConfig>,
    sender: Option<http1::SendRequest<OutgoingBody>>,
    driver: Option<JoinHandle<()>>,
    head: Option<RequestHead>,
    host_override: Option<String>,
    body_tx: Option<mpsc::Sender<Bytes>>,
    pending: Option<PendingResponse>,
    response: Option<Incoming>,
}

impl StandardConnection {
    /// Plain HTTP connection to `host:port`.
    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self::new(ConnectionKind::Http, host.into(), port, None)
    }

    /// HTTPS connection to `host:port`.
    pub fn https(host: impl Into<String>, port: u16, tls: Arc<TlsContext>) -> Self {
        Self::new(ConnectionKind::Https, host.into(), port, Some(tls))
    }

    fn new(kind: ConnectionKind, host: String, port: u16, tls: Option<Arc<TlsContext>>) -> Self {
        Self {
            id: ConnectionId::new(),
            kind,
            host,
            port,
            tls,
            tunnel: None,
            sender: None,
            driver: None,
            head: None,
            host_override: None,
            body_tx: None,
            pending: None,
            response: None,
        }
    }

    fn protocol(&self) -> Protocol {
        match self.kind {
            ConnectionKind::Https => Protocol::Https,
            _ => Protocol::Http,
        }
    }
}

#[async_trait]
impl Connection for StandardConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn kind(&self) -> ConnectionKind {
        self.kind
    }

    fn set_tunnel(&mut self, tunnel: TunnelConfig) {
        self.tunnel = Some(tunnel);
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        let mut tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
        tcp.set_nodelay(true)?;

        tracing::debug!(
            connection_id = %self.id,
            host = %self.host,
            port = self.port,
            tunnel = self.tunnel.is_some(),
            "TCP connection established"
        );

        if let Some(config) = &self.tunnel {
            tunnel::establish(&mut tcp, config).await?;
        }

        let stream = match &self.tls {
            Some(tls) => {
                let server_name = self
                    .tunnel
                    .as_ref()
                    .map(|t| t.host.as_str())
                    .unwrap_or(self.host.as_str());
                MaybeTlsStream::Tls(Box::new(tls.handshake(server_name, tcp).await?))
            }
            None => MaybeTlsStream::Plain(tcp),
        };

        let (sender, conn) = http1::Builder::new()
            .handshake::<_, OutgoingBody>(TokioIo::new(stream))
            .await?;

        let id = self.id;
        self.driver = Some(tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "HTTP/1 connection ended with error");
            }
        }));
        self.sender = Some(sender);
        Ok(())
    }

    fn put_request_line(&mut self, method: &str, path: &str) -> Result<(), ConnectionError> {
        if self.head.is_some() || self.pending.is_some() {
            return Err(ConnectionError::State("request line already written"));
        }
        let mut request = RequestHead::new(method, path)?;

        let default_port = self.protocol().default_port();
        let default_host = match &self.tunnel {
            Some(t) => head::host_header(&t.host, t.port, default_port),
            None => head::host_header(&self.host, self.port, default_port),
        };
        match self.host_override.take() {
            Some(host) => request.set_host(host),
            None => request.set_default_host(default_host),
        }
        self.head = Some(request);
        Ok(())
    }

    fn put_header(&mut self, name: &str, value: &str) -> Result<(), ConnectionError> {
        self.head
            .as_mut()
            .ok_or(ConnectionError::State("headers must follow the request line"))?
            .append(name, value)
    }

    fn set_host_header(&mut self, value: &str) {
        match self.head.as_mut() {
            Some(head) => head.set_host(value),
            None => self.host_override = Some(value.to_string()),
        }
    }

    async fn end_headers(&mut self) -> Result<(), ConnectionError> {
        if self.sender.is_none() {
            return Err(ConnectionError::State("not connected"));
        }
        let head = self
            .head
            .take()
            .ok_or(ConnectionError::State("no request line"))?;

        let body = if head.expects_body() {
            let (tx, body) = OutgoingBody::channel(head.content_length());
            self.body_tx = Some(tx);
            body
        } else {
            OutgoingBody::empty()
        };

        let mut request = Request::builder()
            .method(head.method.clone())
            .uri(head.uri.clone())
            .body(body)
            .map_err(|e| ConnectionError::InvalidPath(e.to_string()))?;
        *request.headers_mut() = head.header_map()?;

        let sender = self
            .sender
            .as_mut()
            .ok_or(ConnectionError::State("not connected"))?;
        sender.ready().await?;
        self.pending = Some(Box::pin(sender.send_request(request)));

        tracing::trace!(
            connection_id = %self.id,
            method = %head.method,
            path = %head.uri,
            "Request head queued"
        );
        Ok(())
    }

    async fn send(&mut self, data: Option<&[u8]>) -> Result<(), ConnectionError> {
        if self.pending.is_none() {
            return Err(ConnectionError::State("body must follow end_headers"));
        }
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Ok(());
        };
        let tx = self
            .body_tx
            .as_ref()
            .ok_or(ConnectionError::State("request headers announced no body"))?;
        if tx.send(Bytes::copy_from_slice(data)).await.is_err() {
            tracing::debug!(connection_id = %self.id, "Peer stopped reading the request body");
        }
        Ok(())
    }

    async fn get_response(&mut self) -> Result<ResponseHead, ConnectionError> {
        self.body_tx = None;
        let pending = self
            .pending
            .take()
            .ok_or(ConnectionError::State("request not sent"))?;

        let (parts, body) = pending.await?.into_parts();
        let length = body.size_hint().exact();
        let head = head::response_head(parts.status, &parts.headers, &parts.extensions, length);
        self.response = Some(body);
        Ok(head)
    }

    async fn read_body(&mut self, length: Option<u64>) -> Result<Bytes, ConnectionError> {
        let body = self
            .response
            .take()
            .ok_or(ConnectionError::State("response not read"))?;
        let mut bytes = body.collect().await?.to_bytes();
        if let Some(n) = length.and_then(|n| usize::try_from(n).ok()) {
            bytes.truncate(n);
        }
        Ok(bytes)
    }

    async fn close(&mut self) {
        self.body_tx = None;
        self.pending = None;
        self.response = None;
        self.sender = None;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
