//! The connection primitive the dispatcher drives.
//!
//! # Responsibilities
//! - Define the `Connection` capability interface
//! - Generate unique connection IDs for tracing
//! - Describe tunnels and response heads shared by all implementations
//!
//! # Design Decisions
//! - One connection serves exactly one request/response exchange
//! - Host header overrides go through `set_host_header`; nothing reaches
//!   into an implementation's write buffer

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Implementation family of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// Built-in HTTP/1.1 over plain TCP.
    Http,
    /// Built-in HTTP/1.1 over TLS.
    Https,
    /// reqwest-backed connection.
    Alternate,
}

impl ConnectionKind {
    /// True for the two built-in HTTP/1.1 kinds.
    pub fn is_standard(self) -> bool {
        matches!(self, ConnectionKind::Http | ConnectionKind::Https)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionKind::Http => "http",
            ConnectionKind::Https => "https",
            ConnectionKind::Alternate => "alternate",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunnel set on a connection before it connects.
///
/// Standard connections are opened to the proxy and treat `host`/`port` as
/// the CONNECT destination. The alternate connection is opened to the real
/// target and treats `host`/`port` as the proxy to route through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    pub host: String,
    pub port: u16,
    /// Extra headers for the CONNECT request (e.g. Proxy-Authorization).
    pub headers: Vec<(String, String)>,
}

impl TunnelConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `host:port` as used in the CONNECT request line and the tunnelled Host header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Status line and headers of a response, before the body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    /// Headers in the order the connection reported them.
    pub headers: Vec<(String, String)>,
    /// Body length, or `None` when the body runs to exhaustion.
    pub length: Option<u64>,
}

/// Errors raised by connection implementations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Tunnel connection failed: {status} {reason}")]
    Tunnel { status: u16, reason: String },

    #[error("Invalid method: {0:?}")]
    InvalidMethod(String),

    #[error("Invalid request path: {0:?}")]
    InvalidPath(String),

    #[error("Invalid header: {0:?}")]
    InvalidHeader(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// An operation was called out of order (e.g. headers before the request line).
    #[error("Connection misuse: {0}")]
    State(&'static str),

    /// The alternate connection only fires its request on `send`.
    #[error("Request was not sent before reading the response")]
    RequestNotSent,

    #[error("Alternate connection error: {0}")]
    Alternate(#[from] reqwest::Error),
}

/// An HTTP connection driven step by step.
///
/// Call order for one exchange: `set_tunnel` (optional), `connect`,
/// `put_request_line`, `set_proxy_credentials` (optional), `put_header` /
/// `set_host_header`, `end_headers`, `send`, `get_response`, `read_body`,
/// `close`.
#[async_trait]
pub trait Connection: Send {
    fn id(&self) -> ConnectionId;

    fn kind(&self) -> ConnectionKind;

    /// Configure a tunnel. Must be called before `connect`.
    fn set_tunnel(&mut self, tunnel: TunnelConfig);

    /// Proxy credentials pushed explicitly after the request line.
    /// Only meaningful for implementations that route through a proxy themselves.
    fn set_proxy_credentials(&mut self, _user: &str, _password: &str) {}

    async fn connect(&mut self) -> Result<(), ConnectionError>;

    fn put_request_line(&mut self, method: &str, path: &str) -> Result<(), ConnectionError>;

    fn put_header(&mut self, name: &str, value: &str) -> Result<(), ConnectionError>;

    /// Replace the Host header the connection would otherwise send.
    fn set_host_header(&mut self, value: &str);

    async fn end_headers(&mut self) -> Result<(), ConnectionError>;

    /// Send body bytes. `None` is an explicit empty send.
    async fn send(&mut self, data: Option<&[u8]>) -> Result<(), ConnectionError>;

    async fn get_response(&mut self) -> Result<ResponseHead, ConnectionError>;

    /// Read the body: exactly `length` bytes, or to exhaustion when `None`.
    async fn read_body(&mut self, length: Option<u64>) -> Result<Bytes, ConnectionError>;

    /// Release the connection. Safe to call on a connection that never connected.
    async fn close(&mut self);
}
