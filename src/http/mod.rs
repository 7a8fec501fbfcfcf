//! HTTP request dispatch.
//!
//! # Data Flow
//! ```text
//! HttpRequest
//!     → client.rs (acquire connection, write request, read response)
//!     → response.rs (lowercase header names)
//!     → HttpResponse, or DispatchError::RequestFailed for status >= 300
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::HttpClient;
pub use error::{DispatchError, HttpError};
pub use request::HttpRequest;
pub use response::HttpResponse;

/// Product string sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("service-dispatch/", env!("CARGO_PKG_VERSION"));
