//! cpumond - CPU metrics polling daemon.
//!
//! Loads the collector configuration, instantiates every enabled collector
//! for the platform and samples each one on its own interval. Snapshots are
//! printed to stdout as JSON lines or logged as one-line summaries.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use cpumon_core::config::ConfigError;
use cpumon_core::{AppConfig, CollectorRegistry, MetricsCollector, Platform, Snapshot};

/// How snapshots are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One JSON object per line on stdout.
    Json,
    /// A human-readable summary per snapshot in the log.
    Text,
}

/// CPU metrics polling daemon.
#[derive(Parser, Debug)]
#[command(name = "cpumond", about = "CPU metrics polling daemon", version)]
struct Args {
    /// Path to the JSON configuration file. Platform defaults apply when the
    /// file does not exist.
    #[arg(short, long, env = "CPUMON_CONFIG")]
    config: Option<PathBuf>,

    /// Override every collector's sampling interval, in seconds.
    #[arg(short, long)]
    interval: Option<f64>,

    /// Path to /proc filesystem (for testing/containers).
    #[arg(long, default_value = "/proc", env = "CPUMON_PROC_PATH")]
    proc_path: PathBuf,

    /// Path to /sys filesystem (for testing/containers).
    #[arg(long, default_value = "/sys", env = "CPUMON_SYS_PATH")]
    sys_path: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Take one measurement per collector and exit. A baseline sample is
    /// taken first so rate fields are populated.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so stdout stays clean for JSON lines.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["cpumond", "cpumon_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration named on the command line, or the platform
/// defaults when none is given.
fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_or_default(path, Platform::current()),
        None => Ok(AppConfig::default_for(Platform::current())),
    }
}

/// Registry for the running host; fails when the config names another
/// platform.
fn host_registry(
    config: &AppConfig,
    proc_path: &Path,
    sys_path: &Path,
) -> Result<CollectorRegistry, ConfigError> {
    let registry =
        CollectorRegistry::for_current_platform().with_probe_roots(proc_path, sys_path);
    config.check_platform(registry.platform_id())?;
    Ok(registry)
}

/// Forces every collector onto `interval_sec`.
fn apply_interval_override(
    collectors: &mut [(String, Box<dyn MetricsCollector>)],
    interval_sec: f64,
) -> Result<(), cpumon_core::collector::CollectorError> {
    for (_, collector) in collectors.iter_mut() {
        let mut options = collector.options().clone();
        options.sampling_interval_sec = interval_sec;
        collector.configure(options)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonLine<'a> {
    collector: &'a str,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

/// Renders a snapshot as one JSON line, tagged with its collector.
fn render_json_line(name: &str, snapshot: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string(&JsonLine {
        collector: name,
        snapshot,
    })
}

/// Describes the present fields of a snapshot for logging.
fn describe_snapshot(snapshot: &Snapshot) -> String {
    let time = chrono::DateTime::from_timestamp_millis((snapshot.timestamp * 1000.0) as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| snapshot.timestamp.to_string());

    let fields: Vec<String> = snapshot
        .fields()
        .filter_map(|(name, value)| value.map(|v| format!("{}={:.2}", name, v)))
        .collect();
    let absent = snapshot.len() - fields.len();

    if fields.is_empty() {
        format!("{} no fields available", time)
    } else if absent > 0 {
        format!("{} {} ({} absent)", time, fields.join(" "), absent)
    } else {
        format!("{} {}", time, fields.join(" "))
    }
}

fn emit(format: OutputFormat, name: &str, snapshot: &Snapshot) {
    match format {
        OutputFormat::Json => match render_json_line(name, snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => error!(collector = %name, error = %e, "failed to serialize snapshot"),
        },
        OutputFormat::Text => info!("[{}] {}", name, describe_snapshot(snapshot)),
    }
}

/// Sleeps up to `duration`, waking early when `running` goes false.
fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let step = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let sleep_time = remaining.min(step);
        std::thread::sleep(sleep_time);
        remaining = remaining.saturating_sub(sleep_time);
    }
}

/// A collector with its next due time.
struct Scheduled {
    name: String,
    collector: Box<dyn MetricsCollector>,
    next_due: Instant,
}

impl Scheduled {
    /// Advances `next_due` by one interval; skips missed ticks instead of
    /// bursting to catch up.
    fn reschedule(&mut self, now: Instant) {
        let interval = self.collector.options().sampling_interval();
        self.next_due += interval;
        if self.next_due <= now {
            self.next_due = now + interval;
        }
    }
}

fn run_once(
    collectors: &mut [(String, Box<dyn MetricsCollector>)],
    format: OutputFormat,
    running: &AtomicBool,
) {
    for (_, collector) in collectors.iter_mut() {
        collector.collect();
    }
    let wait = collectors
        .iter()
        .map(|(_, c)| c.options().sampling_interval())
        .max()
        .unwrap_or_default();
    debug!("baseline taken, waiting {:?}", wait);
    sleep_while_running(wait, running);

    for (name, collector) in collectors.iter_mut() {
        let snapshot = collector.collect();
        emit(format, name, &snapshot);
    }
}

fn run_loop(
    collectors: Vec<(String, Box<dyn MetricsCollector>)>,
    format: OutputFormat,
    running: &AtomicBool,
) {
    let start = Instant::now();
    let mut scheduled: Vec<Scheduled> = collectors
        .into_iter()
        .map(|(name, collector)| Scheduled {
            name,
            collector,
            next_due: start,
        })
        .collect();
    let mut snapshot_count: u64 = 0;

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        for entry in scheduled.iter_mut().filter(|s| s.next_due <= now) {
            let snapshot = entry.collector.collect();
            snapshot_count += 1;
            emit(format, &entry.name, &snapshot);
            if let Some(timing) = entry.collector.last_timing() {
                debug!(
                    collector = %entry.name,
                    total_ms = timing.total.as_secs_f64() * 1000.0,
                    "snapshot #{}",
                    snapshot_count
                );
            }
            entry.reschedule(Instant::now());
        }

        let next = scheduled.iter().map(|s| s.next_due).min();
        if let Some(next) = next {
            sleep_while_running(next.saturating_duration_since(Instant::now()), running);
        }
    }

    info!("Collected {} snapshots", snapshot_count);
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("cpumond {} starting", env!("CARGO_PKG_VERSION"));

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = match host_registry(&config, &args.proc_path, &args.sys_path) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Invalid config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Platform: {}, available collectors: {:?}, enabled: {:?}",
        registry.platform_id(),
        registry.available(),
        config.enabled()
    );

    let mut collectors = match registry.instantiate_enabled(&config) {
        Ok(collectors) => collectors,
        Err(e) => {
            error!("Failed to create collectors: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(interval) = args.interval
        && let Err(e) = apply_interval_override(&mut collectors, interval)
    {
        error!("Invalid --interval: {}", e);
        return ExitCode::FAILURE;
    }

    if collectors.is_empty() {
        warn!(
            "No collectors enabled for platform {}, nothing to do",
            registry.platform_id()
        );
        return ExitCode::SUCCESS;
    }

    for (name, collector) in &collectors {
        info!(
            "Collector {}: interval={}s, history={}, units={}",
            name,
            collector.options().sampling_interval_sec,
            collector.options().history_capacity,
            collector.enumerate_units().len()
        );
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    if args.once {
        run_once(&mut collectors, args.format, &running);
    } else {
        run_loop(collectors, args.format, &running);
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpumon_core::collector::{CpuCollector, LinuxProbe, MockCommand, MockFs, NullProbe};

    fn mock_collectors() -> Vec<(String, Box<dyn MetricsCollector>)> {
        let probe = LinuxProbe::new(MockFs::typical_linux(), MockCommand::new(), "/proc", "/sys");
        let collector: Box<dyn MetricsCollector> = Box::new(CpuCollector::new(Box::new(probe)));
        vec![("cpu".to_string(), collector)]
    }

    #[test]
    fn args_parse_defaults() {
        let args = Args::try_parse_from(["cpumond"]).unwrap();
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.proc_path, PathBuf::from("/proc"));
        assert!(!args.once);
        assert!(args.interval.is_none());
    }

    #[test]
    fn args_parse_flags() {
        let args = Args::try_parse_from([
            "cpumond", "--format", "text", "--once", "-i", "0.5", "-vv",
        ])
        .unwrap();
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.once);
        assert_eq!(args.interval, Some(0.5));
        assert_eq!(args.verbose, 2);
        assert!(Args::try_parse_from(["cpumond", "--format", "xml"]).is_err());
    }

    #[test]
    fn json_line_is_flat_and_ordered() {
        let mut snapshot = Snapshot::with_fields(1700000000.5, &["usage_percent", "temperature_c"]);
        snapshot.set("usage_percent", Some(12.5));
        let line = render_json_line("cpu", &snapshot).unwrap();
        assert_eq!(
            line,
            r#"{"collector":"cpu","timestamp":1700000000.5,"usage_percent":12.5,"temperature_c":null}"#
        );
    }

    #[test]
    fn describe_snapshot_lists_present_fields() {
        let mut snapshot =
            Snapshot::with_fields(0.0, &["usage_percent", "load_1m", "temperature_c"]);
        snapshot.set("usage_percent", Some(12.5));
        snapshot.set("load_1m", Some(0.25));

        let desc = describe_snapshot(&snapshot);
        assert!(desc.starts_with("1970-01-01 00:00:00"));
        assert!(desc.contains("usage_percent=12.50"));
        assert!(desc.contains("load_1m=0.25"));
        assert!(desc.contains("(1 absent)"));
        assert!(!desc.contains("temperature_c"));
    }

    #[test]
    fn describe_empty_snapshot() {
        let snapshot = Snapshot::with_fields(0.0, &["usage_percent"]);
        assert!(describe_snapshot(&snapshot).ends_with("no fields available"));
    }

    #[test]
    fn interval_override_applies_and_validates() {
        let mut collectors = mock_collectors();
        apply_interval_override(&mut collectors, 2.5).unwrap();
        assert_eq!(collectors[0].1.options().sampling_interval_sec, 2.5);

        for bad in [0.0, 1e-12, 1e300] {
            assert!(apply_interval_override(&mut collectors, bad).is_err(), "{bad}");
        }
        assert_eq!(collectors[0].1.options().sampling_interval_sec, 2.5);
    }

    #[test]
    fn host_registry_follows_running_platform() {
        let bare = AppConfig::from_json(r#"{"collectors": {}}"#).unwrap();
        let registry =
            host_registry(&bare, Path::new("/proc"), Path::new("/sys")).unwrap();
        assert_eq!(registry.platform_id(), cpumon_core::util::current_platform_id());

        let other = if Platform::current() == Some(Platform::MacOs) {
            "Linux"
        } else {
            "Darwin"
        };
        let foreign =
            AppConfig::from_json(&format!(r#"{{"system": "{other}", "collectors": {{}}}}"#))
                .unwrap();
        let err = host_registry(&foreign, Path::new("/proc"), Path::new("/sys")).unwrap_err();
        assert!(matches!(err, ConfigError::PlatformMismatch { .. }));
    }

    #[test]
    fn load_config_from_file_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpumon.json");
        std::fs::write(
            &path,
            r#"{"system": "Linux", "collectors": {"cpu": {"enabled": false}}}"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.enabled().is_empty());

        let missing = load_config(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(missing, AppConfig::default_for(Platform::current()));
    }

    #[test]
    fn reschedule_skips_missed_ticks() {
        let mut entry = Scheduled {
            name: "cpu".into(),
            collector: Box::new(CpuCollector::new(Box::new(NullProbe::new(Platform::Windows)))),
            next_due: Instant::now(),
        };
        let start = entry.next_due;
        entry.reschedule(start);
        assert_eq!(entry.next_due, start + Duration::from_secs(1));

        let late = start + Duration::from_secs(10);
        entry.reschedule(late);
        assert_eq!(entry.next_due, late + Duration::from_secs(1));
    }

    #[test]
    fn run_once_collects_baseline_then_emits() {
        let mut collectors = mock_collectors();
        let options = cpumon_core::CollectorOptions {
            sampling_interval_sec: 0.01,
            ..Default::default()
        };
        collectors[0].1.configure(options).unwrap();

        let running = AtomicBool::new(true);
        run_once(&mut collectors, OutputFormat::Text, &running);
        let history = collectors[0].1.history(None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].get("usage_percent"), Some(0.0));
    }
}
