//! Data models for collected metrics.
//!
//! - [`Snapshot`]: one timestamped set of named metric values

mod snapshot;

pub use snapshot::Snapshot;
