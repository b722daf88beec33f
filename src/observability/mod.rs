//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! listeners, forwarders, dispatch engine
//!     → logging.rs (tracing events, console + optional file)
//!     → metrics.rs (counters and gauges, Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
