//! In-memory storage of collected snapshots.

pub mod history;
pub mod model;

pub use history::CollectorHistory;
pub use model::Snapshot;
