//! Probe for platforms with no CPU data source.

use std::time::Duration;

use super::{CpuTimes, LoadAverage, PlatformProbe};
use crate::collector::error::{ProbeError, ProbeResult};
use crate::util::Platform;

/// Reports every reading as unavailable.
#[derive(Debug, Clone, Copy)]
pub struct NullProbe {
    platform: Platform,
}

impl NullProbe {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn unavailable<T>(&self) -> ProbeResult<T> {
        Err(ProbeError::Unavailable(format!(
            "no cpu probe for {}",
            self.platform
        )))
    }
}

impl PlatformProbe for NullProbe {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn enumerate_units(&self) -> Vec<String> {
        Vec::new()
    }

    fn read_load_average(&self) -> ProbeResult<LoadAverage> {
        self.unavailable()
    }

    fn read_counter_snapshot(&self) -> ProbeResult<CpuTimes> {
        self.unavailable()
    }

    fn read_usage_fallback(&self) -> ProbeResult<f64> {
        self.unavailable()
    }

    fn read_frequency_ghz(&self) -> ProbeResult<f64> {
        self.unavailable()
    }

    fn read_min_max_frequency_ghz(&self) -> ProbeResult<(f64, f64)> {
        self.unavailable()
    }

    fn read_uptime_sec(&self) -> ProbeResult<f64> {
        self.unavailable()
    }

    fn read_temperature_c(&self, _timeout: Duration) -> ProbeResult<f64> {
        self.unavailable()
    }

    fn read_process_count(&self) -> ProbeResult<u64> {
        self.unavailable()
    }

    fn read_context_switches(&self) -> ProbeResult<u64> {
        self.unavailable()
    }

    fn read_interrupt_count(&self) -> ProbeResult<u64> {
        self.unavailable()
    }

    fn read_physical_cores(&self) -> ProbeResult<u64> {
        self.unavailable()
    }
}
