use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::{SCAN_POOL, TRACKER_POOL};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// A handle that is not installed as the global recorder. Renders nothing
/// recorded through the `metrics` macros; used where no exporter is wanted.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

fn register_metrics() {
    // Pre-register counters so they appear even before the first increment.
    counter!("wallet_scans_total").absolute(0);
    counter!("token_replays_total").absolute(0);
    // Pool series are only ever emitted per pool.
    for pool in [SCAN_POOL, TRACKER_POOL] {
        counter!("pool_tasks_completed", "pool" => pool).absolute(0);
        counter!("pool_tasks_failed", "pool" => pool).absolute(0);
        gauge!("pool_active_workers", "pool" => pool).set(0.0);
        gauge!("pool_queue_depth", "pool" => pool).set(0.0);
    }

    // Histogram is lazily created on first record; force creation.
    histogram!("wallet_scan_seconds").record(0.0);
}
