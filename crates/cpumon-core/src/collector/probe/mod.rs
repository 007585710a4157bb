//! Platform probes: OS-specific raw CPU readings.
//!
//! Each supported OS family has one [`PlatformProbe`] implementation:
//!
//! | Probe        | Platform | Sources                                   |
//! |--------------|----------|-------------------------------------------|
//! | `LinuxProbe` | Linux    | `/proc/*`, `/sys/devices/system/cpu`, `/sys/class/thermal` |
//! | `MacProbe`   | macOS    | `sysctl`, `ps`, `powermetrics`            |
//! | `NullProbe`  | Windows  | nothing; every reading is unavailable     |
//!
//! Every reading is independent: a failing read returns a [`ProbeError`] for
//! that reading only and never prevents the others from running.

mod linux;
mod macos;
mod null;
pub mod parser;

pub use linux::LinuxProbe;
pub use macos::MacProbe;
pub use null::NullProbe;

use std::time::Duration;

use crate::collector::error::ProbeResult;
use crate::util::Platform;

/// Cumulative CPU time counters, in clock ticks.
///
/// This is the single counter shape shared by every platform that can read
/// tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Total CPU time across all states.
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
            .saturating_add(self.irq)
            .saturating_add(self.softirq)
            .saturating_add(self.steal)
    }

    /// Idle time (idle + iowait).
    pub fn idle_time(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }

    /// Non-idle time.
    pub fn busy(&self) -> u64 {
        self.total().saturating_sub(self.idle_time())
    }
}

/// Load average values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    /// 1-minute load average.
    pub one: f64,
    /// 5-minute load average.
    pub five: f64,
    /// 15-minute load average.
    pub fifteen: f64,
}

/// OS-specific source of raw CPU readings.
///
/// Implementations must not panic. Errors are reported per reading and are
/// always non-fatal to the caller.
pub trait PlatformProbe: Send {
    /// Platform family this probe reads.
    fn platform(&self) -> Platform;

    /// Logical CPUs visible to this host, as `cpu0..cpuN-1`.
    ///
    /// Ordering is stable across calls. Returns an empty vector when
    /// discovery fails.
    fn enumerate_units(&self) -> Vec<String>;

    /// 1, 5 and 15 minute load averages.
    fn read_load_average(&self) -> ProbeResult<LoadAverage>;

    /// Aggregate CPU tick counters, taken from a single read of one source.
    fn read_counter_snapshot(&self) -> ProbeResult<CpuTimes>;

    /// Coarse whole-host CPU usage estimate, in percent.
    ///
    /// Only meant to be called after [`read_counter_snapshot`] has failed.
    ///
    /// [`read_counter_snapshot`]: PlatformProbe::read_counter_snapshot
    fn read_usage_fallback(&self) -> ProbeResult<f64>;

    /// Current CPU frequency in GHz, averaged across units.
    fn read_frequency_ghz(&self) -> ProbeResult<f64>;

    /// Minimum and maximum CPU frequency in GHz.
    fn read_min_max_frequency_ghz(&self) -> ProbeResult<(f64, f64)>;

    /// Seconds since boot.
    fn read_uptime_sec(&self) -> ProbeResult<f64>;

    /// Hottest CPU temperature sensor in degrees Celsius.
    ///
    /// `timeout` bounds any external helper the probe has to invoke.
    fn read_temperature_c(&self, timeout: Duration) -> ProbeResult<f64>;

    /// Number of processes currently alive.
    fn read_process_count(&self) -> ProbeResult<u64>;

    /// Context switches since boot.
    fn read_context_switches(&self) -> ProbeResult<u64>;

    /// Interrupts serviced since boot.
    fn read_interrupt_count(&self) -> ProbeResult<u64>;

    /// Number of physical cores.
    fn read_physical_cores(&self) -> ProbeResult<u64>;
}

/// Formats unit ids the same way on every platform.
pub(crate) fn unit_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("cpu{}", i)).collect()
}
