//! Request descriptor handed to the dispatcher.

use bytes::Bytes;

pub const CONTENT_LENGTH: &str = "Content-Length";

/// An abstract HTTP request: what to send, not how.
///
/// Headers keep insertion order. A header whose value is `None` (or empty)
/// is skipped when the request is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub host: String,
    pub path: String,
    /// `"http"` or `"https"`; the client default applies when unset.
    pub protocol: Option<String>,
    /// Overrides the protocol's default port.
    pub port: Option<u16>,
    pub headers: Vec<(String, Option<String>)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            host: host.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Set the body and a matching `Content-Length`, replacing any earlier one.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case(CONTENT_LENGTH));
        self.headers
            .push((CONTENT_LENGTH.to_string(), Some(body.len().to_string())));
        self.body = Some(body);
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}
