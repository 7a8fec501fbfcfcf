//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → connector.rs (pick standard or alternate, open one connection)
//!     → standard.rs: TCP → tunnel.rs (CONNECT, optional) → tls.rs (optional)
//!                    → hyper http1 handshake (head and body framing)
//!     → alternate.rs: reqwest, proxy handled by the client itself
//!
//! Connection States:
//!     Opened → Connected → HeadersSent → ResponseRead → Closed
//! ```
//!
//! # Design Decisions
//! - One connection per request, closed by the dispatcher
//! - TLS configuration is built once per client and shared

pub mod alternate;
pub mod connection;
pub mod connector;
pub mod head;
pub mod standard;
pub mod stream;
pub mod tls;
pub mod tunnel;

pub use connection::{Connection, ConnectionError, ConnectionId, ConnectionKind, ResponseHead, TunnelConfig};
pub use connector::{Connector, PlatformConnector};
