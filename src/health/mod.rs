//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each known node (HTTP GET, timeout)
//!     → Passing subset
//!     → NodeDirectory::replace_healthy (skipped when empty or unchanged)
//! ```
//!
//! # Design Decisions
//! - Health is a set membership, not a per-node state machine
//! - An all-failing cycle is measurement noise, never an outage
//! - Probes of one cycle run concurrently

pub mod active;

pub use active::{CycleOutcome, HealthMonitor, ProbeOutcome};
