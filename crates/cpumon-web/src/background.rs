//! Background polling: keeps each collector's history filled.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::state::{SharedCollector, lock};

/// Samples `collector` every `interval` until the runtime shuts down.
pub(crate) async fn tick_loop(name: String, collector: SharedCollector, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut snapshot_count: u64 = 0;

    loop {
        tick.tick().await;

        // collect() blocks on file reads and helper processes
        let collector_clone = collector.clone();
        let t0 = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = lock(&collector_clone);
            guard.collect().present_count()
        })
        .await;
        let elapsed = t0.elapsed();

        let present = match result {
            Ok(present) => present,
            Err(e) => {
                error!(collector = %name, error = %e, "tick panicked in spawn_blocking");
                continue;
            }
        };

        snapshot_count += 1;
        if snapshot_count == 1 {
            info!(
                collector = %name,
                duration_ms = elapsed.as_millis() as u64,
                present,
                "first snapshot collected"
            );
        } else {
            debug!(
                collector = %name,
                duration_ms = elapsed.as_millis() as u64,
                present,
                snapshot_count,
                "tick completed"
            );
        }

        if elapsed > interval / 2 {
            warn!(
                collector = %name,
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "tick exceeded 50% of interval"
            );
        }
    }
}
