//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (target, connection id, error)
//! - Metrics are cheap (atomic increments)
//! - The core only writes metrics; it never reads the exporter back

pub mod logging;
pub mod metrics;

pub use metrics::BalancerStats;
