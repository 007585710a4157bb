//! Shared application state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cpumon_core::MetricsCollector;

/// A collector shared between the poller and request handlers.
///
/// `collect()` blocks, so the lock is only ever taken inside
/// `tokio::task::spawn_blocking`.
pub(crate) type SharedCollector = Arc<Mutex<Box<dyn MetricsCollector>>>;

pub(crate) struct WebAppInner {
    /// Platform id the registry resolved.
    pub(crate) platform_id: String,
    /// Collector types the platform offers, enabled or not.
    pub(crate) available: Vec<String>,
    /// Enabled collectors by type id.
    pub(crate) collectors: BTreeMap<String, SharedCollector>,
}

/// Router state; cheap to clone.
#[derive(Clone)]
pub(crate) struct AppState(pub(crate) Arc<WebAppInner>);

impl AppState {
    pub(crate) fn new(
        platform_id: String,
        available: Vec<String>,
        collectors: Vec<(String, Box<dyn MetricsCollector>)>,
    ) -> Self {
        let collectors = collectors
            .into_iter()
            .map(|(name, c)| (name, Arc::new(Mutex::new(c))))
            .collect();
        Self(Arc::new(WebAppInner {
            platform_id,
            available,
            collectors,
        }))
    }

    pub(crate) fn collector(&self, name: &str) -> Option<SharedCollector> {
        self.0.collectors.get(name).cloned()
    }
}

/// Locks a collector, recovering from a poisoned lock.
pub(crate) fn lock(collector: &SharedCollector) -> MutexGuard<'_, Box<dyn MetricsCollector>> {
    collector.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
