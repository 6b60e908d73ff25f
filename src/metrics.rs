use ::metrics::{counter, histogram};
use tracing::trace;

// Recorded through the `metrics` facade; a no-op until a recorder is
// installed, so tests and library callers need no setup.

pub fn inc_requests(route: &'static str) {
    counter!("sync_requests_total", "route" => route).increment(1);
    trace!(target = "sync.metrics", route = route, "requests_total_inc");
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    histogram!("sync_stage_elapsed_ms", "stage" => stage).record(elapsed_ms as f64);
    trace!(
        target = "sync.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn run_finished(outcome: &'static str) {
    counter!("sync_runs_total", "outcome" => outcome).increment(1);
    trace!(target = "sync.metrics", outcome = outcome, "runs_total_inc");
}

pub fn variant_miss() {
    counter!("sync_variant_misses_total").increment(1);
}
