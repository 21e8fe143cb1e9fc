//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery result
//!     → directory.rs (known set, healthy snapshot)
//!     → target.rs (uniform random node, node:port target)
//!     → pool.rs (lease idle connection or dial)
//!     → Return backend connection or error
//! ```
//!
//! # Design Decisions
//! - Selection is stateless; no weighting and no session affinity
//! - Snapshots are immutable and swapped whole
//! - Connection pooling per target, reject on overflow

pub mod directory;
pub mod pool;
pub mod target;

pub use directory::NodeDirectory;
pub use pool::{ConnectionPool, DiscardReason, PoolError, PutOutcome};
pub use target::{select_node, target_addr};
