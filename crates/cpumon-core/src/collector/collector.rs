//! The collector contract shared by every metrics family.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::error::CollectorError;
use crate::storage::Snapshot;

/// Shortest accepted sampling interval.
pub const MIN_SAMPLING_INTERVAL: Duration = Duration::from_millis(1);

/// Longest accepted sampling interval (one day).
pub const MAX_SAMPLING_INTERVAL: Duration = Duration::from_secs(86_400);

/// Options accepted by every collector.
///
/// Missing keys take their defaults. `interval` is accepted as an alias of
/// `sampling_interval_sec`; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorOptions {
    /// Seconds between samples. Used by callers as their polling cadence.
    #[serde(alias = "interval")]
    pub sampling_interval_sec: f64,
    /// Number of snapshots kept in the rolling history.
    pub history_capacity: usize,
    /// Upper bound for the temperature helper, in milliseconds.
    pub temperature_timeout_ms: u64,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            sampling_interval_sec: 1.0,
            history_capacity: 300,
            temperature_timeout_ms: 2000,
        }
    }
}

impl CollectorOptions {
    /// Checks every option, returning the first violation.
    pub fn validate(&self) -> Result<(), CollectorError> {
        let in_range = Duration::try_from_secs_f64(self.sampling_interval_sec)
            .is_ok_and(|d| (MIN_SAMPLING_INTERVAL..=MAX_SAMPLING_INTERVAL).contains(&d));
        if !in_range {
            return Err(CollectorError::InvalidConfiguration(format!(
                "sampling_interval_sec must be between {} and {} seconds, got {}",
                MIN_SAMPLING_INTERVAL.as_secs_f64(),
                MAX_SAMPLING_INTERVAL.as_secs_f64(),
                self.sampling_interval_sec
            )));
        }
        if self.history_capacity == 0 {
            return Err(CollectorError::InvalidConfiguration(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.temperature_timeout_ms == 0 {
            return Err(CollectorError::InvalidConfiguration(
                "temperature_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Builds validated options from a raw JSON value.
    ///
    /// `null` yields the defaults.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CollectorError> {
        let options = if value.is_null() {
            Self::default()
        } else {
            Self::deserialize(value)
                .map_err(|e| CollectorError::InvalidConfiguration(e.to_string()))?
        };
        options.validate()?;
        Ok(options)
    }

    /// Sampling interval, clamped to the accepted range.
    ///
    /// Validated options never need the clamp; it keeps hand-built ones from
    /// producing a zero or overflowing period.
    pub fn sampling_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sampling_interval_sec)
            .unwrap_or(MAX_SAMPLING_INTERVAL)
            .clamp(MIN_SAMPLING_INTERVAL, MAX_SAMPLING_INTERVAL)
    }

    pub fn temperature_timeout(&self) -> Duration {
        Duration::from_millis(self.temperature_timeout_ms)
    }
}

/// Lifecycle of a collector.
///
/// `Uninitialized → Ready` on the first successful `configure()` (or the
/// first `collect()`, which applies defaults). `Sampling` only lasts for
/// the duration of a `collect()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Uninitialized,
    Ready,
    Sampling,
}

/// Time spent in each probe reading during the last `collect()`.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total snapshot collection time.
    pub total: Duration,
    /// Logical unit discovery.
    pub units: Duration,
    /// Usage counters, plus the fallback when it ran.
    pub usage: Duration,
    /// Current, min and max frequency.
    pub frequency: Duration,
    pub load: Duration,
    pub uptime: Duration,
    /// Temperature sensors or helper process.
    pub temperature: Duration,
    pub processes: Duration,
    /// Context switch and interrupt counters.
    pub counters: Duration,
    /// Physical core count.
    pub topology: Duration,
}

/// A source of periodic metric snapshots.
///
/// `collect()` takes `&mut self`: the counter state behind rate fields must
/// not be observed concurrently. Share a collector across threads only
/// behind a lock.
pub trait MetricsCollector: Send {
    /// Registry id of this collector type (`"cpu"`).
    fn name(&self) -> &'static str;

    /// Validates and applies `options`; they take effect on the next
    /// `collect()`. On error the previous options stay in place.
    fn configure(&mut self, options: CollectorOptions) -> Result<(), CollectorError>;

    /// Like [`configure`](Self::configure), from a raw JSON options object.
    fn configure_value(&mut self, value: &serde_json::Value) -> Result<(), CollectorError> {
        match CollectorOptions::from_value(value) {
            Ok(options) => self.configure(options),
            Err(e) => {
                tracing::warn!(collector = self.name(), error = %e, "rejected collector options");
                Err(e)
            }
        }
    }

    fn options(&self) -> &CollectorOptions;

    fn state(&self) -> CollectorState;

    /// Logical units this collector reports on.
    fn enumerate_units(&self) -> Vec<String>;

    /// Keys every snapshot of this collector carries, in order.
    fn field_names(&self) -> &'static [&'static str];

    /// Samples every field, appends the snapshot to the history and returns
    /// it. Never fails: unreadable fields are absent.
    fn collect(&mut self) -> Snapshot;

    /// Up to `limit` most recent snapshots (all when `None`), oldest first.
    fn history(&self, limit: Option<usize>) -> Vec<Snapshot>;

    /// Newest snapshot in the history.
    fn latest(&self) -> Option<Snapshot> {
        self.history(Some(1)).pop()
    }

    fn last_timing(&self) -> Option<&CollectorTiming>;
}
