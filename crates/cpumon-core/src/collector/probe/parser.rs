//! Parsers for `/proc`, `/sys` and OS utility output.
//!
//! These are pure functions that turn file or command content into
//! structured data. They are designed to be easily testable with string inputs.

use std::collections::HashSet;

use super::{CpuTimes, LoadAverage};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses a single trimmed number, rejecting NaN and infinities.
pub fn parse_finite(s: &str) -> Result<f64, ParseError> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| ParseError::new(format!("invalid number '{}'", s.trim())))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ParseError::new(format!("non-finite number '{}'", s.trim())))
    }
}

/// Parses a single trimmed unsigned integer.
pub fn parse_u64(s: &str) -> Result<u64, ParseError> {
    s.trim()
        .parse()
        .map_err(|_| ParseError::new(format!("invalid integer '{}'", s.trim())))
}

// ============ /proc/stat ============

/// Single CPU line from `/proc/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStat {
    pub cpu_id: Option<u32>, // None for aggregate "cpu" line
    pub times: CpuTimes,
}

/// Global stats from `/proc/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStat {
    pub cpus: Vec<CpuStat>,
    pub ctxt: Option<u64>,
    /// First value of the `intr` line: interrupts serviced since boot.
    pub intr_total: Option<u64>,
}

impl GlobalStat {
    /// Returns the aggregate `cpu` line, if present.
    pub fn aggregate(&self) -> Option<&CpuTimes> {
        self.cpus
            .iter()
            .find(|c| c.cpu_id.is_none())
            .map(|c| &c.times)
    }

    /// Returns per-CPU ids sorted ascending.
    pub fn cpu_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.cpus.iter().filter_map(|c| c.cpu_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Parses `/proc/stat` content.
///
/// `guest` and `guest_nice` are ignored: the kernel already accounts them
/// inside `user` and `nice`.
pub fn parse_global_stat(content: &str) -> Result<GlobalStat, ParseError> {
    let mut stat = GlobalStat::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        if parts[0].starts_with("cpu") {
            let cpu_id = if parts[0] == "cpu" {
                None
            } else {
                match parts[0].strip_prefix("cpu").and_then(|s| s.parse().ok()) {
                    Some(id) => Some(id),
                    None => continue,
                }
            };

            if parts.len() < 5 {
                return Err(ParseError::new(format!(
                    "not enough fields in '{}' line: got {}",
                    parts[0],
                    parts.len() - 1
                )));
            }

            let get_val =
                |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

            stat.cpus.push(CpuStat {
                cpu_id,
                times: CpuTimes {
                    user: get_val(1),
                    nice: get_val(2),
                    system: get_val(3),
                    idle: get_val(4),
                    iowait: get_val(5),
                    irq: get_val(6),
                    softirq: get_val(7),
                    steal: get_val(8),
                },
            });
        } else if parts[0] == "ctxt" {
            stat.ctxt = parts.get(1).and_then(|s| s.parse().ok());
        } else if parts[0] == "intr" {
            stat.intr_total = parts.get(1).and_then(|s| s.parse().ok());
        }
    }

    Ok(stat)
}

// ============ /proc/loadavg ============

/// Parses `/proc/loadavg` content.
///
/// Format: `0.15 0.10 0.05 1/150 1234`
pub fn parse_loadavg(content: &str) -> Result<LoadAverage, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    Ok(LoadAverage {
        one: parse_finite(parts[0]).map_err(|_| ParseError::new("invalid load1"))?,
        five: parse_finite(parts[1]).map_err(|_| ParseError::new("invalid load5"))?,
        fifteen: parse_finite(parts[2]).map_err(|_| ParseError::new("invalid load15"))?,
    })
}

// ============ /proc/uptime ============

/// Parses `/proc/uptime` content and returns seconds since boot.
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    parse_finite(first)
}

// ============ /proc/cpuinfo ============

/// The subset of `/proc/cpuinfo` the probes need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuInfo {
    /// Number of `processor` entries.
    pub processors: usize,
    /// `cpu MHz` values, one per processor that reports it.
    pub mhz: Vec<f64>,
    /// Distinct `(physical id, core id)` pairs.
    pub cores: HashSet<(String, String)>,
}

/// Parses `/proc/cpuinfo` content.
///
/// Blocks are separated by blank lines; the last block does not need a
/// trailing blank line.
pub fn parse_cpuinfo(content: &str) -> CpuInfo {
    let mut info = CpuInfo::default();
    let mut physical: Option<String> = None;
    let mut core: Option<String> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            flush(&mut physical, &mut core, &mut info);
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "processor" => info.processors += 1,
            "physical id" => physical = Some(value.to_string()),
            "core id" => core = Some(value.to_string()),
            _ if key.eq_ignore_ascii_case("cpu mhz") => {
                if let Ok(mhz) = parse_finite(value) {
                    info.mhz.push(mhz);
                }
            }
            _ => {}
        }
    }
    flush(&mut physical, &mut core, &mut info);

    info
}

fn flush(physical: &mut Option<String>, core: &mut Option<String>, info: &mut CpuInfo) {
    if let (Some(p), Some(c)) = (physical.take(), core.take()) {
        info.cores.insert((p, c));
    }
}

// ============ /proc/interrupts ============

/// Sums every per-CPU counter in `/proc/interrupts`.
///
/// The header line names the CPU columns; each following row is
/// `IRQ: count_cpu0 count_cpu1 ... description`. Rows such as `ERR:` carry a
/// single value and are counted as-is.
pub fn parse_interrupts(content: &str) -> Result<u64, ParseError> {
    let mut lines = content.lines();
    let header = lines
        .next()
        .ok_or_else(|| ParseError::new("empty interrupts"))?;
    let ncpu = header
        .split_whitespace()
        .filter(|col| col.starts_with("CPU"))
        .count();
    if ncpu == 0 {
        return Err(ParseError::new("interrupts header has no CPU columns"));
    }

    let mut total: u64 = 0;
    for line in lines {
        let Some((_, rest)) = line.split_once(':') else {
            continue;
        };
        for value in rest
            .split_whitespace()
            .take(ncpu)
            .map_while(|tok| tok.parse::<u64>().ok())
        {
            total = total.saturating_add(value);
        }
    }
    Ok(total)
}

// ============ /sys ============

/// Parses a cpufreq file (kHz) into GHz.
pub fn parse_khz_as_ghz(content: &str) -> Result<f64, ParseError> {
    Ok(parse_u64(content)? as f64 / 1_000_000.0)
}

/// Parses a thermal zone `temp` file (millidegrees Celsius).
pub fn parse_millidegrees(content: &str) -> Result<f64, ParseError> {
    Ok(parse_finite(content)? / 1000.0)
}

// ============ macOS utilities ============

/// Parses `sysctl -n vm.loadavg` output.
///
/// Format: `{ 1.23 4.56 7.89 }`
pub fn parse_sysctl_loadavg(content: &str) -> Result<LoadAverage, ParseError> {
    let trimmed = content.trim().trim_start_matches('{').trim_end_matches('}');
    parse_loadavg(trimmed)
}

/// Parses `sysctl -n kern.boottime` output and returns the boot time in
/// seconds since the epoch.
///
/// Format: `{ sec = 1700000000, usec = 123456 } Tue Nov 14 22:13:20 2023`
pub fn parse_boottime(content: &str) -> Result<u64, ParseError> {
    content
        .split("sec = ")
        .nth(1)
        .and_then(|s| s.split(',').next())
        .ok_or_else(|| ParseError::new("missing 'sec =' in boottime"))
        .and_then(parse_u64)
}

/// Extracts the CPU die temperature from `powermetrics --samplers smc`.
///
/// Looks for a line like `CPU die temperature: 45.67 C`.
pub fn parse_powermetrics_temperature(content: &str) -> Result<f64, ParseError> {
    content
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("cpu die temperature") {
                return None;
            }
            value.split_whitespace().next().map(parse_finite)
        })
        .unwrap_or_else(|| Err(ParseError::new("no CPU die temperature in output")))
}

/// Sums the `%CPU` column of `ps -A -o %cpu`.
///
/// The header line and blank lines are skipped; a malformed row fails the
/// whole parse rather than silently under-reporting.
pub fn parse_ps_cpu_sum(content: &str) -> Result<f64, ParseError> {
    let mut sum = 0.0;
    let mut rows = 0usize;
    for line in content.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        sum += parse_finite(line.replace(',', ".").as_str())?;
        rows += 1;
    }
    if rows == 0 {
        return Err(ParseError::new("ps printed no process rows"));
    }
    Ok(sum)
}

/// Counts non-empty lines of `ps -A -o pid=` (no header).
pub fn count_nonempty_lines(content: &str) -> u64 {
    content.lines().filter(|l| !l.trim().is_empty()).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_STAT: &str = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
";

    #[test]
    fn test_parse_global_stat() {
        let stat = parse_global_stat(PROC_STAT).unwrap();

        assert_eq!(stat.cpus.len(), 3);
        let agg = stat.aggregate().unwrap();
        assert_eq!(agg.user, 10000);
        assert_eq!(agg.idle, 80000);
        assert_eq!(agg.total(), 94800);
        assert_eq!(agg.busy(), 94800 - 80000 - 1000);
        assert_eq!(stat.cpu_ids(), vec![0, 1]);
        assert_eq!(stat.ctxt, Some(500000));
        assert_eq!(stat.intr_total, Some(1000000));
    }

    #[test]
    fn test_parse_global_stat_sorts_cpu_ids() {
        let stat = parse_global_stat("cpu 1 1 1 1\ncpu10 1 1 1 1\ncpu2 1 1 1 1\ncpu0 1 1 1 1\n")
            .unwrap();
        assert_eq!(stat.cpu_ids(), vec![0, 2, 10]);
    }

    #[test]
    fn test_parse_global_stat_short_cpu_line() {
        assert!(parse_global_stat("cpu 1 2\n").is_err());
    }

    #[test]
    fn test_parse_global_stat_missing_counters() {
        let stat = parse_global_stat("cpu 1 2 3 4\n").unwrap();
        assert_eq!(stat.ctxt, None);
        assert_eq!(stat.intr_total, None);
    }

    #[test]
    fn test_parse_loadavg() {
        let load = parse_loadavg("0.15 0.10 0.05 1/150 1234\n").unwrap();
        assert!((load.one - 0.15).abs() < 1e-9);
        assert!((load.five - 0.10).abs() < 1e-9);
        assert!((load.fifteen - 0.05).abs() < 1e-9);

        assert!(parse_loadavg("garbage").is_err());
        assert!(parse_loadavg("nan 0.1 0.1 1/1 1").is_err());
    }

    #[test]
    fn test_parse_uptime() {
        assert!((parse_uptime("12345.67 98765.43\n").unwrap() - 12345.67).abs() < 1e-9);
        assert!(parse_uptime("").is_err());
    }

    #[test]
    fn test_parse_cpuinfo_hyperthreaded() {
        let content = "\
processor\t: 0
physical id\t: 0
core id\t\t: 0
cpu MHz\t\t: 2400.000

processor\t: 1
physical id\t: 0
core id\t\t: 0
cpu MHz\t\t: 2600.000

processor\t: 2
physical id\t: 0
core id\t\t: 1
cpu MHz\t\t: 2800.000
";
        let info = parse_cpuinfo(content);
        assert_eq!(info.processors, 3);
        assert_eq!(info.mhz, vec![2400.0, 2600.0, 2800.0]);
        assert_eq!(info.cores.len(), 2);
    }

    #[test]
    fn test_parse_cpuinfo_arm_without_topology() {
        let content = "processor\t: 0\nBogoMIPS\t: 48.00\n\nprocessor\t: 1\nBogoMIPS\t: 48.00\n";
        let info = parse_cpuinfo(content);
        assert_eq!(info.processors, 2);
        assert!(info.mhz.is_empty());
        assert!(info.cores.is_empty());
    }

    #[test]
    fn test_parse_interrupts() {
        let content = "\
           CPU0       CPU1
  0:         45          5   IO-APIC   2-edge      timer
  8:          0          1   IO-APIC   8-edge      rtc0
NMI:         10         20   Non-maskable interrupts
ERR:          3
";
        assert_eq!(parse_interrupts(content).unwrap(), 45 + 5 + 1 + 10 + 20 + 3);
        assert!(parse_interrupts("").is_err());
    }

    #[test]
    fn test_parse_sys_units() {
        assert!((parse_khz_as_ghz("2400000\n").unwrap() - 2.4).abs() < 1e-9);
        assert!((parse_millidegrees("45500\n").unwrap() - 45.5).abs() < 1e-9);
        assert!(parse_khz_as_ghz("n/a").is_err());
    }

    #[test]
    fn test_parse_sysctl_loadavg() {
        let load = parse_sysctl_loadavg("{ 1.23 4.56 7.89 }\n").unwrap();
        assert!((load.one - 1.23).abs() < 1e-9);
        assert!((load.fifteen - 7.89).abs() < 1e-9);
    }

    #[test]
    fn test_parse_boottime() {
        let out = "{ sec = 1700000000, usec = 123456 } Tue Nov 14 22:13:20 2023";
        assert_eq!(parse_boottime(out).unwrap(), 1700000000);
        assert!(parse_boottime("garbage").is_err());
    }

    #[test]
    fn test_parse_powermetrics_temperature() {
        let out = "\
**** SMC sensors ****

CPU Thermal level: 0
CPU die temperature: 47.25 C
GPU die temperature: 40.00 C
";
        assert!((parse_powermetrics_temperature(out).unwrap() - 47.25).abs() < 1e-9);
        assert!(parse_powermetrics_temperature("nothing here").is_err());
    }

    #[test]
    fn test_parse_ps_cpu_sum() {
        let out = " %CPU\n 12.5\n  0.0\n 30,5\n\n";
        assert!((parse_ps_cpu_sum(out).unwrap() - 43.0).abs() < 1e-9);
        assert!(parse_ps_cpu_sum(" %CPU\n").is_err());
        assert!(parse_ps_cpu_sum(" %CPU\n abc\n").is_err());
    }

    #[test]
    fn test_count_nonempty_lines() {
        assert_eq!(count_nonempty_lines("    1\n  42\n\n 999\n"), 3);
    }
}
