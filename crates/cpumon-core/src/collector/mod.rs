//! CPU metrics collection.
//!
//! This module turns OS-specific readings into uniform, timestamped
//! snapshots, with mocks so every platform can be tested on any host.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      CollectorRegistry                       │
//! │        platform → ["cpu"], instantiate(), enable/disable     │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │              CpuCollector (impl MetricsCollector)            │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌────────────────┐  │
//! │  │ DeltaTracker │  │ RateTracker × 2  │  │CollectorHistory│  │
//! │  │   usage %    │  │  ctxt/s, intr/s  │  │  bounded FIFO  │  │
//! │  └──────────────┘  └──────────────────┘  └────────────────┘  │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//!                      ┌─────────▼─────────┐
//!                      │   PlatformProbe   │ (trait)
//!                      └─────────┬─────────┘
//!              ┌─────────────────┼─────────────────┐
//!       ┌──────▼──────┐   ┌──────▼──────┐   ┌──────▼──────┐
//!       │ LinuxProbe  │   │  MacProbe   │   │  NullProbe  │
//!       │ FileSystem  │   │CommandRunner│   │  (Windows)  │
//!       └─────────────┘   └─────────────┘   └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```ignore
//! use cpumon_core::collector::{CollectorOptions, CollectorRegistry};
//!
//! let registry = CollectorRegistry::for_current_platform();
//! let mut cpu = registry.instantiate("cpu", &CollectorOptions::default())?;
//! let snapshot = cpu.collect();
//! ```
//!
//! ## Testing (with MockFs)
//!
//! ```
//! use cpumon_core::collector::{CpuCollector, LinuxProbe, MetricsCollector, MockCommand, MockFs};
//!
//! let probe = LinuxProbe::new(MockFs::typical_linux(), MockCommand::new(), "/proc", "/sys");
//! let mut collector = CpuCollector::new(Box::new(probe));
//! let snapshot = collector.collect();
//! assert_eq!(snapshot.get("logical_cores"), Some(4.0));
//! ```

#[allow(clippy::module_inception)]
mod collector;
mod cpu;
pub mod delta;
mod error;
pub mod mock;
pub mod probe;
pub mod registry;
pub mod traits;

pub use collector::{CollectorOptions, CollectorState, CollectorTiming, MetricsCollector};
pub use cpu::{CPU_COLLECTOR, CPU_FIELDS, CpuCollector};
pub use delta::{CounterState, DeltaTracker, RateTracker, observe_counters};
pub use error::{CollectorError, ProbeError, ProbeResult};
pub use mock::{MockCommand, MockFs};
pub use probe::{CpuTimes, LinuxProbe, LoadAverage, MacProbe, NullProbe, PlatformProbe};
pub use registry::{CollectorRegistry, resolve};
pub use traits::{CommandRunner, FileSystem, RealCommand, RealFs};
