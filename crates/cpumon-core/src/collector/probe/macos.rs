//! macOS probe built on `sysctl`, `ps` and `powermetrics`.
//!
//! macOS exposes no tick counters through its command-line utilities, so
//! [`PlatformProbe::read_counter_snapshot`] is always unavailable here and
//! usage comes from the `ps` fallback.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::parser::{
    count_nonempty_lines, parse_boottime, parse_finite, parse_powermetrics_temperature,
    parse_ps_cpu_sum, parse_sysctl_loadavg, parse_u64,
};
use super::{CpuTimes, LoadAverage, PlatformProbe, unit_ids};
use crate::collector::error::{ProbeError, ProbeResult};
use crate::collector::traits::CommandRunner;
use crate::util::Platform;

/// Default bound for `sysctl` and `ps` invocations.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Reads CPU metrics on macOS through OS utilities.
pub struct MacProbe<C: CommandRunner> {
    runner: C,
    command_timeout: Duration,
}

impl<C: CommandRunner> MacProbe<C> {
    pub fn new(runner: C) -> Self {
        Self {
            runner,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    fn sysctl(&self, key: &str) -> ProbeResult<String> {
        self.runner.run("sysctl", &["-n", key], self.command_timeout)
    }

    fn sysctl_u64(&self, key: &str) -> ProbeResult<u64> {
        Ok(parse_u64(&self.sysctl(key)?)?)
    }

    fn sysctl_hz_as_ghz(&self, key: &str) -> ProbeResult<f64> {
        let hz = parse_finite(&self.sysctl(key)?)?;
        if hz <= 0.0 {
            return Err(ProbeError::Parse(format!("{} reported {} Hz", key, hz)));
        }
        Ok(hz / 1e9)
    }

    fn logical_count(&self) -> ProbeResult<u64> {
        self.sysctl_u64("hw.logicalcpu")
            .or_else(|_| self.sysctl_u64("hw.ncpu"))
    }
}

impl<C: CommandRunner> PlatformProbe for MacProbe<C> {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn enumerate_units(&self) -> Vec<String> {
        match self.logical_count() {
            Ok(n) => unit_ids(n as usize),
            Err(e) => {
                tracing::debug!(error = %e, "logical cpu count unavailable");
                Vec::new()
            }
        }
    }

    fn read_load_average(&self) -> ProbeResult<LoadAverage> {
        Ok(parse_sysctl_loadavg(&self.sysctl("vm.loadavg")?)?)
    }

    fn read_counter_snapshot(&self) -> ProbeResult<CpuTimes> {
        Err(ProbeError::Unavailable(
            "tick counters are not exposed on macOS".into(),
        ))
    }

    fn read_usage_fallback(&self) -> ProbeResult<f64> {
        let units = self.logical_count()?;
        if units == 0 {
            return Err(ProbeError::Unavailable("unit count unknown".into()));
        }
        let out = self
            .runner
            .run("ps", &["-A", "-o", "%cpu"], self.command_timeout)?;
        let sum = parse_ps_cpu_sum(&out)?;
        Ok((sum / units as f64).clamp(0.0, 100.0))
    }

    fn read_frequency_ghz(&self) -> ProbeResult<f64> {
        self.sysctl_hz_as_ghz("hw.cpufrequency")
    }

    fn read_min_max_frequency_ghz(&self) -> ProbeResult<(f64, f64)> {
        let min = self.sysctl_hz_as_ghz("hw.cpufrequency_min")?;
        let max = self.sysctl_hz_as_ghz("hw.cpufrequency_max")?;
        Ok((min, max))
    }

    fn read_uptime_sec(&self) -> ProbeResult<f64> {
        let boot = parse_boottime(&self.sysctl("kern.boottime")?)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?
            .as_secs_f64();
        let uptime = now - boot as f64;
        if uptime < 0.0 {
            return Err(ProbeError::Parse(format!("boot time {} is in the future", boot)));
        }
        Ok(uptime)
    }

    fn read_temperature_c(&self, timeout: Duration) -> ProbeResult<f64> {
        // -n keeps sudo from prompting; without cached rights it fails fast.
        let out = self.runner.run(
            "sudo",
            &["-n", "powermetrics", "--samplers", "smc", "-i", "1", "-n", "1"],
            timeout,
        )?;
        Ok(parse_powermetrics_temperature(&out)?)
    }

    fn read_process_count(&self) -> ProbeResult<u64> {
        let out = self
            .runner
            .run("ps", &["-A", "-o", "pid="], self.command_timeout)?;
        match count_nonempty_lines(&out) {
            0 => Err(ProbeError::Unavailable("ps listed no processes".into())),
            n => Ok(n),
        }
    }

    fn read_context_switches(&self) -> ProbeResult<u64> {
        Err(ProbeError::Unavailable(
            "context switch counter is not exposed on macOS".into(),
        ))
    }

    fn read_interrupt_count(&self) -> ProbeResult<u64> {
        Err(ProbeError::Unavailable(
            "interrupt counter is not exposed on macOS".into(),
        ))
    }

    fn read_physical_cores(&self) -> ProbeResult<u64> {
        self.sysctl_u64("hw.physicalcpu")
    }
}
