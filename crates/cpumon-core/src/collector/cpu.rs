//! Host-level CPU collector.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::collector::collector::{
    CollectorOptions, CollectorState, CollectorTiming, MetricsCollector,
};
use crate::collector::delta::{DeltaTracker, RateTracker};
use crate::collector::error::{CollectorError, ProbeResult};
use crate::collector::probe::PlatformProbe;
use crate::storage::{CollectorHistory, Snapshot};

/// Registry id of the CPU collector.
pub const CPU_COLLECTOR: &str = "cpu";

/// Fields of every CPU snapshot, in emission order.
pub const CPU_FIELDS: &[&str] = &[
    "usage_percent",
    "frequency_ghz",
    "frequency_min_ghz",
    "frequency_max_ghz",
    "load_1m",
    "load_5m",
    "load_15m",
    "load_1m_per_core",
    "uptime_sec",
    "logical_cores",
    "physical_cores",
    "temperature_c",
    "process_count",
    "context_switches",
    "context_switch_rate",
    "interrupts",
    "interrupt_rate",
];

/// Samples whole-host CPU metrics from a [`PlatformProbe`].
///
/// Usage comes from tick counter deltas when the platform has them and from
/// the probe's coarse estimator otherwise. Context switch and interrupt
/// rates come from their own counters. Each stream has its own tracker.
pub struct CpuCollector {
    probe: Box<dyn PlatformProbe>,
    options: CollectorOptions,
    state: CollectorState,
    usage: DeltaTracker,
    context_switch_rate: RateTracker,
    interrupt_rate: RateTracker,
    history: CollectorHistory,
    last_timing: Option<CollectorTiming>,
}

impl CpuCollector {
    /// Creates an unconfigured collector over `probe`.
    pub fn new(probe: Box<dyn PlatformProbe>) -> Self {
        let options = CollectorOptions::default();
        Self {
            probe,
            history: CollectorHistory::new(options.history_capacity),
            options,
            state: CollectorState::Uninitialized,
            usage: DeltaTracker::new(),
            context_switch_rate: RateTracker::new(),
            interrupt_rate: RateTracker::new(),
            last_timing: None,
        }
    }

    /// Creates a collector and applies `options`.
    pub fn with_options(
        probe: Box<dyn PlatformProbe>,
        options: CollectorOptions,
    ) -> Result<Self, CollectorError> {
        let mut collector = Self::new(probe);
        collector.configure(options)?;
        Ok(collector)
    }

    fn usage_percent(&mut self) -> Option<f64> {
        match self.probe.read_counter_snapshot() {
            Ok(times) => self.usage.observe(times.total(), times.busy()),
            Err(e) => {
                debug!(
                    collector = CPU_COLLECTOR,
                    error = %e,
                    "counters unavailable, using fallback"
                );
                reading("usage_percent", self.probe.read_usage_fallback())
            }
        }
    }
}

/// Turns a probe result into an optional value, logging the failure.
fn reading<T>(field: &'static str, result: ProbeResult<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(collector = CPU_COLLECTOR, field, error = %e, "probe reading unavailable");
            None
        }
    }
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl MetricsCollector for CpuCollector {
    fn name(&self) -> &'static str {
        CPU_COLLECTOR
    }

    fn configure(&mut self, options: CollectorOptions) -> Result<(), CollectorError> {
        if let Err(e) = options.validate() {
            tracing::warn!(collector = CPU_COLLECTOR, error = %e, "rejected collector options");
            return Err(e);
        }
        self.history.set_capacity(options.history_capacity);
        self.options = options;
        if self.state == CollectorState::Uninitialized {
            self.state = CollectorState::Ready;
        }
        Ok(())
    }

    fn options(&self) -> &CollectorOptions {
        &self.options
    }

    fn state(&self) -> CollectorState {
        self.state
    }

    fn enumerate_units(&self) -> Vec<String> {
        self.probe.enumerate_units()
    }

    fn field_names(&self) -> &'static [&'static str] {
        CPU_FIELDS
    }

    /// Collects one CPU snapshot.
    ///
    /// Every reading is attempted independently; a failure only blanks its
    /// own fields. Also records timing information accessible via
    /// `last_timing()`.
    fn collect(&mut self) -> Snapshot {
        if self.state == CollectorState::Uninitialized {
            debug!(collector = CPU_COLLECTOR, "collecting before configure, using defaults");
            let _ = self.configure(CollectorOptions::default());
        }
        self.state = CollectorState::Sampling;

        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();
        let mut snap = Snapshot::with_fields(now_epoch_secs(), CPU_FIELDS);

        let start = Instant::now();
        let units = self.probe.enumerate_units().len();
        timing.units = start.elapsed();
        if units > 0 {
            snap.set("logical_cores", Some(units as f64));
        }

        let start = Instant::now();
        snap.set("usage_percent", self.usage_percent());
        timing.usage = start.elapsed();

        let start = Instant::now();
        snap.set(
            "frequency_ghz",
            reading("frequency_ghz", self.probe.read_frequency_ghz()),
        );
        if let Some((min, max)) = reading(
            "frequency_min_max_ghz",
            self.probe.read_min_max_frequency_ghz(),
        ) {
            snap.set("frequency_min_ghz", Some(min));
            snap.set("frequency_max_ghz", Some(max));
        }
        timing.frequency = start.elapsed();

        let start = Instant::now();
        if let Some(load) = reading("load_average", self.probe.read_load_average()) {
            snap.set("load_1m", Some(load.one));
            snap.set("load_5m", Some(load.five));
            snap.set("load_15m", Some(load.fifteen));
            if units > 0 {
                snap.set("load_1m_per_core", Some(load.one / units as f64));
            }
        }
        timing.load = start.elapsed();

        let start = Instant::now();
        snap.set("uptime_sec", reading("uptime_sec", self.probe.read_uptime_sec()));
        timing.uptime = start.elapsed();

        let start = Instant::now();
        snap.set(
            "temperature_c",
            reading(
                "temperature_c",
                self.probe
                    .read_temperature_c(self.options.temperature_timeout()),
            ),
        );
        timing.temperature = start.elapsed();

        let start = Instant::now();
        snap.set(
            "process_count",
            reading("process_count", self.probe.read_process_count()).map(|n| n as f64),
        );
        timing.processes = start.elapsed();

        let start = Instant::now();
        if let Some(count) = reading("context_switches", self.probe.read_context_switches()) {
            snap.set("context_switches", Some(count as f64));
            snap.set(
                "context_switch_rate",
                self.context_switch_rate.observe(count, Instant::now()),
            );
        }
        if let Some(count) = reading("interrupts", self.probe.read_interrupt_count()) {
            snap.set("interrupts", Some(count as f64));
            snap.set(
                "interrupt_rate",
                self.interrupt_rate.observe(count, Instant::now()),
            );
        }
        timing.counters = start.elapsed();

        let start = Instant::now();
        snap.set(
            "physical_cores",
            reading("physical_cores", self.probe.read_physical_cores()).map(|n| n as f64),
        );
        timing.topology = start.elapsed();

        timing.total = total_start.elapsed();
        debug!(
            collector = CPU_COLLECTOR,
            present = snap.present_count(),
            total_ms = timing.total.as_secs_f64() * 1000.0,
            temperature_ms = timing.temperature.as_secs_f64() * 1000.0,
            "collected snapshot"
        );

        self.history.push(snap.clone());
        self.last_timing = Some(timing);
        self.state = CollectorState::Ready;
        snap
    }

    fn history(&self, limit: Option<usize>) -> Vec<Snapshot> {
        match limit {
            Some(limit) => self.history.recent(limit),
            None => self.history.all(),
        }
    }

    fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::error::ProbeError;
    use crate::collector::mock::{MockCommand, MockFs};
    use crate::collector::probe::{CpuTimes, LinuxProbe, LoadAverage, MacProbe, NullProbe};
    use crate::util::Platform;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Probe that replays a fixed sequence of counter readings.
    struct ScriptedProbe {
        counters: Mutex<VecDeque<ProbeResult<CpuTimes>>>,
        fallback: ProbeResult<f64>,
    }

    impl ScriptedProbe {
        fn new(pairs: &[(u64, u64)]) -> Self {
            let counters = pairs
                .iter()
                .map(|&(total, busy)| {
                    Ok(CpuTimes {
                        user: busy,
                        idle: total - busy,
                        ..Default::default()
                    })
                })
                .collect();
            Self {
                counters: Mutex::new(counters),
                fallback: Err(ProbeError::Unavailable("no fallback".into())),
            }
        }
    }

    impl PlatformProbe for ScriptedProbe {
        fn platform(&self) -> Platform {
            Platform::Linux
        }
        fn enumerate_units(&self) -> Vec<String> {
            vec!["cpu0".into(), "cpu1".into()]
        }
        fn read_load_average(&self) -> ProbeResult<LoadAverage> {
            Err(ProbeError::Unavailable("load".into()))
        }
        fn read_counter_snapshot(&self) -> ProbeResult<CpuTimes> {
            self.counters
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProbeError::Unavailable("script exhausted".into())))
        }
        fn read_usage_fallback(&self) -> ProbeResult<f64> {
            self.fallback.clone()
        }
        fn read_frequency_ghz(&self) -> ProbeResult<f64> {
            Ok(f64::NAN)
        }
        fn read_min_max_frequency_ghz(&self) -> ProbeResult<(f64, f64)> {
            Err(ProbeError::Unavailable("freq".into()))
        }
        fn read_uptime_sec(&self) -> ProbeResult<f64> {
            Ok(100.0)
        }
        fn read_temperature_c(&self, _timeout: Duration) -> ProbeResult<f64> {
            Err(ProbeError::Unavailable("temp".into()))
        }
        fn read_process_count(&self) -> ProbeResult<u64> {
            Ok(7)
        }
        fn read_context_switches(&self) -> ProbeResult<u64> {
            Err(ProbeError::Unavailable("ctxt".into()))
        }
        fn read_interrupt_count(&self) -> ProbeResult<u64> {
            Err(ProbeError::Unavailable("intr".into()))
        }
        fn read_physical_cores(&self) -> ProbeResult<u64> {
            Err(ProbeError::Unavailable("cores".into()))
        }
    }

    fn linux(fs: MockFs, runner: MockCommand) -> CpuCollector {
        CpuCollector::new(Box::new(LinuxProbe::new(fs, runner, "/proc", "/sys")))
    }

    fn keys(snap: &Snapshot) -> Vec<&str> {
        snap.field_names().collect()
    }

    #[test]
    fn test_usage_from_counter_deltas() {
        let mut collector = CpuCollector::new(Box::new(ScriptedProbe::new(&[
            (100, 40),
            (150, 70),
            (220, 110),
        ])));

        let got: Vec<Option<f64>> = (0..3)
            .map(|_| collector.collect().get("usage_percent"))
            .collect();

        assert_eq!(got[0], None);
        assert!((got[1].unwrap() - 60.0).abs() < 1e-9);
        assert!((got[2].unwrap() - 57.142857).abs() < 1e-4);
    }

    #[test]
    fn test_counter_failure_uses_fallback() {
        let mut probe = ScriptedProbe::new(&[]);
        probe.fallback = Ok(33.0);
        let mut collector = CpuCollector::new(Box::new(probe));
        assert_eq!(collector.collect().get("usage_percent"), Some(33.0));
    }

    #[test]
    fn test_first_observation_does_not_trigger_fallback() {
        let runner = MockCommand::new().with_output("ps", "%CPU\n50.0\n");
        let mut collector = linux(MockFs::typical_linux(), runner.clone());

        let snap = collector.collect();
        assert_eq!(snap.get("usage_percent"), None);
        assert_eq!(runner.call_count("ps"), 0);
    }

    #[test]
    fn test_snapshot_has_fixed_keys_in_order() {
        let mut collector = linux(MockFs::typical_linux(), MockCommand::new());
        let snap = collector.collect();
        assert_eq!(keys(&snap), CPU_FIELDS);
        assert_eq!(collector.field_names(), CPU_FIELDS);
    }

    #[test]
    fn test_typical_linux_values() {
        let mut collector = linux(MockFs::typical_linux(), MockCommand::new());
        collector.collect();
        let snap = collector.collect();

        // Static mock counters: total did not move.
        assert_eq!(snap.get("usage_percent"), Some(0.0));
        assert_eq!(snap.get("logical_cores"), Some(4.0));
        assert_eq!(snap.get("physical_cores"), Some(2.0));
        assert!((snap.get("frequency_ghz").unwrap() - 2.3).abs() < 1e-9);
        assert!((snap.get("frequency_min_ghz").unwrap() - 0.8).abs() < 1e-9);
        assert!((snap.get("frequency_max_ghz").unwrap() - 3.6).abs() < 1e-9);
        assert_eq!(snap.get("load_1m"), Some(0.15));
        assert!((snap.get("load_1m_per_core").unwrap() - 0.0375).abs() < 1e-9);
        assert_eq!(snap.get("uptime_sec"), Some(12345.67));
        assert_eq!(snap.get("temperature_c"), Some(52.0));
        assert_eq!(snap.get("process_count"), Some(3.0));
        assert_eq!(snap.get("context_switches"), Some(500000.0));
        assert_eq!(snap.get("interrupts"), Some(1000000.0));
        assert_eq!(snap.get("context_switch_rate"), Some(0.0));
        assert_eq!(snap.get("interrupt_rate"), Some(0.0));
    }

    #[test]
    fn test_first_snapshot_has_no_rates() {
        let mut collector = linux(MockFs::typical_linux(), MockCommand::new());
        let snap = collector.collect();
        assert_eq!(snap.get("context_switch_rate"), None);
        assert_eq!(snap.get("interrupt_rate"), None);
        assert_eq!(snap.get("context_switches"), Some(500000.0));
    }

    #[test]
    fn test_eight_cores_load_per_core() {
        let mut collector = linux(MockFs::eight_core_linux(), MockCommand::new());
        let units = collector.enumerate_units();
        assert_eq!(units.len(), 8);

        let snap = collector.collect();
        assert_eq!(snap.get("logical_cores"), Some(8.0));
        assert_eq!(snap.get("load_1m_per_core"), Some(0.5));
        assert_eq!(snap.get("physical_cores"), None);
        assert_eq!(snap.get("temperature_c"), None);
        assert_eq!(snap.get("frequency_ghz"), Some(3.0));
    }

    #[test]
    fn test_macos_uses_fallback_and_helpers() {
        let runner = MockCommand::typical_macos();
        let mut collector = CpuCollector::new(Box::new(MacProbe::new(runner.clone())));
        let snap = collector.collect();

        assert_eq!(snap.get("usage_percent"), Some(25.0));
        assert_eq!(snap.get("logical_cores"), Some(8.0));
        assert_eq!(snap.get("physical_cores"), Some(4.0));
        assert_eq!(snap.get("temperature_c"), Some(45.5));
        assert_eq!(snap.get("process_count"), Some(5.0));
        assert_eq!(snap.get("context_switches"), None);
        assert_eq!(snap.get("interrupt_rate"), None);
        assert_eq!(runner.call_count("ps -A -o %cpu"), 1);
    }

    #[test]
    fn test_temperature_timeout_only_blanks_temperature() {
        let runner = MockCommand::typical_macos().with_timeout("sudo");
        let mut collector = CpuCollector::new(Box::new(MacProbe::new(runner.clone())));
        collector
            .configure(CollectorOptions {
                temperature_timeout_ms: 10,
                ..Default::default()
            })
            .unwrap();

        let snap = collector.collect();
        assert_eq!(snap.get("temperature_c"), None);
        assert_eq!(snap.get("load_1m"), Some(1.5));
        assert_eq!(snap.get("usage_percent"), Some(25.0));
        assert_eq!(snap.get("process_count"), Some(5.0));
        assert_eq!(runner.call_count("sudo"), 1);
    }

    #[test]
    fn test_null_probe_snapshot_is_all_absent() {
        let mut collector = CpuCollector::new(Box::new(NullProbe::new(Platform::Windows)));
        let snap = collector.collect();
        assert_eq!(keys(&snap), CPU_FIELDS);
        assert_eq!(snap.present_count(), 0);
        assert!(snap.timestamp > 0.0);
    }

    #[test]
    fn test_non_finite_reading_is_absent() {
        let mut collector = CpuCollector::new(Box::new(ScriptedProbe::new(&[])));
        let snap = collector.collect();
        assert_eq!(snap.get("frequency_ghz"), None);
        assert_eq!(snap.get("uptime_sec"), Some(100.0));
    }

    #[test]
    fn test_state_transitions() {
        let mut collector = CpuCollector::new(Box::new(NullProbe::new(Platform::Windows)));
        assert_eq!(collector.state(), CollectorState::Uninitialized);
        collector.collect();
        assert_eq!(collector.state(), CollectorState::Ready);
        assert_eq!(collector.options(), &CollectorOptions::default());
    }

    #[test]
    fn test_invalid_configure_keeps_previous() {
        let mut collector = CpuCollector::new(Box::new(NullProbe::new(Platform::Windows)));
        let good = CollectorOptions {
            sampling_interval_sec: 5.0,
            ..Default::default()
        };
        collector.configure(good.clone()).unwrap();

        let err = collector
            .configure_value(&serde_json::json!({"sampling_interval_sec": 0}))
            .unwrap_err();
        assert!(matches!(err, CollectorError::InvalidConfiguration(_)));
        assert_eq!(collector.options(), &good);
        assert_eq!(collector.state(), CollectorState::Ready);
    }

    #[test]
    fn test_history_bounded_and_ordered() {
        let mut collector = CpuCollector::with_options(
            Box::new(NullProbe::new(Platform::Windows)),
            CollectorOptions {
                history_capacity: 3,
                ..Default::default()
            },
        )
        .unwrap();

        let mut stamps = Vec::new();
        for _ in 0..5 {
            stamps.push(collector.collect().timestamp);
        }

        let all = collector.history(None);
        assert_eq!(all.len(), 3);
        assert_eq!(
            all.iter().map(|s| s.timestamp).collect::<Vec<_>>(),
            stamps[2..]
        );
        assert_eq!(collector.history(Some(2)).len(), 2);
        assert_eq!(collector.latest().map(|s| s.timestamp), Some(stamps[4]));
        // Reading history does not change it.
        assert_eq!(collector.history(None), all);
    }

    #[test]
    fn test_last_timing_recorded() {
        let mut collector = linux(MockFs::typical_linux(), MockCommand::new());
        assert!(collector.last_timing().is_none());
        collector.collect();
        let timing = collector.last_timing().unwrap();
        assert!(timing.total >= timing.temperature);
    }
}
