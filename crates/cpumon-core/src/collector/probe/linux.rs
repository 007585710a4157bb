//! Linux probe reading `/proc` and `/sys`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::parser::{
    GlobalStat, parse_cpuinfo, parse_global_stat, parse_interrupts, parse_khz_as_ghz,
    parse_loadavg, parse_millidegrees, parse_ps_cpu_sum, parse_uptime,
};
use super::{CpuTimes, LoadAverage, PlatformProbe, unit_ids};
use crate::collector::error::{ProbeError, ProbeResult};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::util::Platform;

/// Timeout for the `ps` usage fallback.
const PS_TIMEOUT: Duration = Duration::from_secs(2);

/// Reads CPU metrics from the Linux `/proc` and `/sys` filesystems.
pub struct LinuxProbe<F: FileSystem, C: CommandRunner> {
    fs: F,
    runner: C,
    proc_path: PathBuf,
    sys_path: PathBuf,
}

impl<F: FileSystem, C: CommandRunner> LinuxProbe<F, C> {
    /// Creates a new Linux probe.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `runner` - Command runner for the `ps` fallback
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `sys_path` - Base path to sysfs (usually "/sys")
    pub fn new(
        fs: F,
        runner: C,
        proc_path: impl Into<PathBuf>,
        sys_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            runner,
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
        }
    }

    fn read_proc(&self, name: &str) -> ProbeResult<String> {
        Ok(self.fs.read_to_string(&self.proc_path.join(name))?)
    }

    fn read_stat(&self) -> ProbeResult<GlobalStat> {
        let content = self.read_proc("stat")?;
        Ok(parse_global_stat(&content)?)
    }

    fn cpufreq_dir(&self, unit: &str) -> PathBuf {
        self.sys_path
            .join("devices/system/cpu")
            .join(unit)
            .join("cpufreq")
    }

    /// Averages one cpufreq file across the `units` that expose it.
    fn mean_cpufreq(&self, units: &[String], file: &str) -> ProbeResult<f64> {
        let values: Vec<f64> = units
            .iter()
            .filter_map(|unit| {
                let path = self.cpufreq_dir(unit).join(file);
                let content = self.fs.read_to_string(&path).ok()?;
                parse_khz_as_ghz(&content).ok()
            })
            .collect();
        mean(&values)
            .ok_or_else(|| ProbeError::Unavailable(format!("no readable cpufreq/{}", file)))
    }

    /// Falls back to the `cpu MHz` lines of `/proc/cpuinfo`.
    fn mean_cpuinfo_mhz(&self) -> ProbeResult<f64> {
        let info = parse_cpuinfo(&self.read_proc("cpuinfo")?);
        mean(&info.mhz)
            .map(|mhz| mhz / 1000.0)
            .ok_or_else(|| ProbeError::Unavailable("no 'cpu MHz' in cpuinfo".into()))
    }

    fn thermal_zones(&self) -> ProbeResult<Vec<PathBuf>> {
        let dir = self.sys_path.join("class/thermal");
        let mut zones: Vec<PathBuf> = self
            .fs
            .read_dir(&dir)?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("thermal_zone"))
            })
            .collect();
        zones.sort();
        Ok(zones)
    }
}

impl<F: FileSystem, C: CommandRunner> PlatformProbe for LinuxProbe<F, C> {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn enumerate_units(&self) -> Vec<String> {
        if let Ok(stat) = self.read_stat() {
            let ids = stat.cpu_ids();
            if !ids.is_empty() {
                return ids.into_iter().map(|id| format!("cpu{}", id)).collect();
            }
        }
        match self.read_proc("cpuinfo") {
            Ok(content) => unit_ids(parse_cpuinfo(&content).processors),
            Err(_) => Vec::new(),
        }
    }

    fn read_load_average(&self) -> ProbeResult<LoadAverage> {
        Ok(parse_loadavg(&self.read_proc("loadavg")?)?)
    }

    fn read_counter_snapshot(&self) -> ProbeResult<CpuTimes> {
        self.read_stat()?
            .aggregate()
            .copied()
            .ok_or_else(|| ProbeError::Parse("no aggregate cpu line in /proc/stat".into()))
    }

    fn read_usage_fallback(&self) -> ProbeResult<f64> {
        let units = self.enumerate_units().len();
        if units == 0 {
            return Err(ProbeError::Unavailable("unit count unknown".into()));
        }
        let out = self.runner.run("ps", &["-A", "-o", "%cpu"], PS_TIMEOUT)?;
        let sum = parse_ps_cpu_sum(&out)?;
        Ok((sum / units as f64).clamp(0.0, 100.0))
    }

    fn read_frequency_ghz(&self) -> ProbeResult<f64> {
        let units = self.enumerate_units();
        self.mean_cpufreq(&units, "scaling_cur_freq")
            .or_else(|_| self.mean_cpuinfo_mhz())
    }

    fn read_min_max_frequency_ghz(&self) -> ProbeResult<(f64, f64)> {
        let units = self.enumerate_units();
        let min = self.mean_cpufreq(&units, "scaling_min_freq")?;
        let max = self.mean_cpufreq(&units, "scaling_max_freq")?;
        Ok((min, max))
    }

    fn read_uptime_sec(&self) -> ProbeResult<f64> {
        Ok(parse_uptime(&self.read_proc("uptime")?)?)
    }

    fn read_temperature_c(&self, _timeout: Duration) -> ProbeResult<f64> {
        let hottest = self
            .thermal_zones()?
            .iter()
            .filter_map(|zone| {
                let content = self.fs.read_to_string(&zone.join("temp")).ok()?;
                parse_millidegrees(&content).ok()
            })
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));
        hottest.ok_or_else(|| ProbeError::Unavailable("no readable thermal zone".into()))
    }

    fn read_process_count(&self) -> ProbeResult<u64> {
        let count = self
            .fs
            .read_dir(&self.proc_path)?
            .iter()
            .filter(|p| is_pid_dir(p))
            .count();
        if count == 0 {
            return Err(ProbeError::Unavailable(format!(
                "no pid entries under {}",
                self.proc_path.display()
            )));
        }
        Ok(count as u64)
    }

    fn read_context_switches(&self) -> ProbeResult<u64> {
        self.read_stat()?
            .ctxt
            .ok_or_else(|| ProbeError::Parse("no ctxt line in /proc/stat".into()))
    }

    fn read_interrupt_count(&self) -> ProbeResult<u64> {
        if let Ok(Some(total)) = self.read_stat().map(|s| s.intr_total) {
            return Ok(total);
        }
        Ok(parse_interrupts(&self.read_proc("interrupts")?)?)
    }

    fn read_physical_cores(&self) -> ProbeResult<u64> {
        let info = parse_cpuinfo(&self.read_proc("cpuinfo")?);
        if info.cores.is_empty() {
            return Err(ProbeError::Unavailable(
                "cpuinfo has no physical id/core id".into(),
            ));
        }
        Ok(info.cores.len() as u64)
    }
}

fn is_pid_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
