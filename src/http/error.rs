//! Dispatch errors.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::http::response::{find_header, serialize_body};
use crate::net::ConnectionError;

/// A response with status >= 300.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{status} {reason}")]
pub struct HttpError {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    #[serde(serialize_with = "serialize_body")]
    pub body: Option<Bytes>,
}

impl HttpError {
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Request failed: {0}")]
    RequestFailed(HttpError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Invalid protocol: {0:?}")]
    InvalidProtocol(String),
}
