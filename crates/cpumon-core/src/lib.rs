//! cpumon-core: shared library for the cpumon binaries.
//!
//! Provides:
//! - `collector` — platform probes, delta trackers, the collector contract
//!   and the per-platform registry
//! - `storage` — snapshot model and rolling history
//! - `config` — JSON configuration file
//! - `util` — platform identity

pub mod collector;
pub mod config;
pub mod storage;
pub mod util;

pub use collector::{CollectorOptions, CollectorRegistry, MetricsCollector};
pub use config::AppConfig;
pub use storage::Snapshot;
pub use util::Platform;
