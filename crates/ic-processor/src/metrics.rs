//! Batch metrics, exported through whatever recorder the binary installs

use metrics::{counter, histogram};

use crate::report::BatchReport;

pub const BATCH_RUNS_TOTAL: &str = "ic_batch_runs_total";
pub const BATCH_ITEMS_TOTAL: &str = "ic_batch_items_total";
pub const BATCH_DURATION_SECONDS: &str = "ic_batch_duration_seconds";

pub fn record_run(report: &BatchReport) {
    let outcome = if report.is_success() { "success" } else { "failed" };
    counter!(BATCH_RUNS_TOTAL, "outcome" => outcome).increment(1);

    counter!(BATCH_ITEMS_TOTAL, "outcome" => "processed").increment(report.processed.len() as u64);
    counter!(BATCH_ITEMS_TOTAL, "outcome" => "missing").increment(report.skipped_missing as u64);
    counter!(BATCH_ITEMS_TOTAL, "outcome" => "already_processed")
        .increment(report.skipped_already_processed as u64);
    for failure in &report.failures {
        counter!(BATCH_ITEMS_TOTAL, "outcome" => "failed", "kind" => failure.kind()).increment(1);
    }

    histogram!(BATCH_DURATION_SECONDS).record(report.elapsed.as_secs_f64());
}

/// A run that died listing ids still counts as a failed run
pub fn record_snapshot_failure() {
    counter!(BATCH_RUNS_TOTAL, "outcome" => "failed", "stage" => "snapshot").increment(1);
}
