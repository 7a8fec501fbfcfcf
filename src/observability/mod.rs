//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and connections produce:
//!     → logging.rs (structured log events, `dispatch` span per request)
//!     → metrics.rs (counters, histograms)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
