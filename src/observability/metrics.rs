//! Dispatch metrics.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): completed exchanges by method, status, connection kind
//! - `dispatch_request_duration_seconds` (histogram): time from acquire to body read
//! - `dispatch_connection_errors_total` (counter): exchanges that failed below HTTP
//!
//! Recording goes through the `metrics` facade. No exporter is installed here;
//! the embedding application chooses one.

use std::time::Instant;

use crate::net::ConnectionKind;

/// Record one completed exchange, whatever its status.
pub fn record_dispatch(method: &str, status: u16, kind: ConnectionKind, start: Instant) {
    metrics::counter!(
        "dispatch_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "connection" => kind.as_str(),
    )
    .increment(1);

    metrics::histogram!(
        "dispatch_request_duration_seconds",
        "method" => method.to_string(),
        "connection" => kind.as_str(),
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_connection_error(kind: ConnectionKind) {
    metrics::counter!("dispatch_connection_errors_total", "connection" => kind.as_str()).increment(1);
}
