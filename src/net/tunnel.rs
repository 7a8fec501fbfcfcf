//! HTTP CONNECT tunnelling through a proxy.
//!
//! # Responsibilities
//! - Build the Proxy-Authorization value for Basic auth
//! - Run the CONNECT handshake on a freshly opened proxy stream
//!
//! # Design Decisions
//! - Only `200` from the proxy opens the tunnel; anything else is a
//!   `ConnectionError::Tunnel` carrying the proxy's status and reason
//! - The proxy must not send bytes past its response head

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::net::connection::{ConnectionError, TunnelConfig};

pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";

/// Largest proxy response head accepted.
const MAX_HEAD_LEN: usize = 16 * 1024;
const MAX_HEADERS: usize = 64;

/// `Basic base64(user:password)`.
pub fn basic_authorization(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Serialize the CONNECT request for `tunnel`.
pub fn encode_connect(tunnel: &TunnelConfig) -> Vec<u8> {
    let authority = tunnel.authority();
    let mut buf = format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n", authority);
    for (name, value) in &tunnel.headers {
        buf.push_str(&format!("{}: {}\r\n", name, value));
    }
    buf.push_str("\r\n");
    buf.into_bytes()
}

fn malformed(reason: impl Into<String>) -> ConnectionError {
    ConnectionError::MalformedResponse(reason.into())
}

/// Ask the proxy on `stream` to open a tunnel to `tunnel.host:tunnel.port`.
pub async fn establish<S>(stream: &mut S, tunnel: &TunnelConfig) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for (name, value) in &tunnel.headers {
        if http::HeaderName::from_bytes(name.as_bytes()).is_err()
            || http::HeaderValue::from_str(value).is_err()
        {
            return Err(ConnectionError::InvalidHeader(name.clone()));
        }
    }

    stream.write_all(&encode_connect(tunnel)).await?;
    stream.flush().await?;

    let mut buf = Vec::with_capacity(512);
    let (status, reason) = loop {
        if buf.len() >= MAX_HEAD_LEN {
            return Err(malformed("proxy response head too large"));
        }
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(malformed("proxy closed the connection while tunnelling"));
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut headers);
        match response.parse(&buf).map_err(|e| malformed(e.to_string()))? {
            httparse::Status::Complete(len) => {
                if len < buf.len() {
                    return Err(malformed("proxy sent data past the tunnel response"));
                }
                break (
                    response.code.unwrap_or_default(),
                    response.reason.unwrap_or_default().to_string(),
                );
            }
            httparse::Status::Partial => continue,
        }
    };

    if status != 200 {
        tracing::warn!(
            target_authority = %tunnel.authority(),
            status,
            reason = %reason,
            "Proxy refused tunnel"
        );
        return Err(ConnectionError::Tunnel { status, reason });
    }

    tracing::debug!(target_authority = %tunnel.authority(), "Tunnel established");
    Ok(())
}
