//! HTTP request dispatch over pluggable connections.
//!
//! ```text
//!     HttpRequest ──▶ http::HttpClient ──▶ net::Connector ──▶ net::Connection
//!                          │                                   │
//!                          │                  standard: TCP ─▶ CONNECT ─▶ TLS
//!                          │                  alternate: reqwest
//!                          ▼
//!     HttpResponse / DispatchError::RequestFailed
//! ```

pub mod config;
pub mod http;
pub mod net;
pub mod observability;

pub use config::schema::ClientConfig;
pub use http::{DispatchError, HttpClient, HttpError, HttpRequest, HttpResponse};
