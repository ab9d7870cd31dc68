//! Per-job summary counters, emitted through `tracing`.
//!
//! Wire a subscriber (or an exporter) in the hosting binary.

use std::time::Duration;

use strata_core::prelude::JobId;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobMetrics {
    pub completed: usize,
    pub failed: usize,
    /// Never ran because an ancestor failed.
    pub skipped: usize,
    pub wall: Duration,
}

impl JobMetrics {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

pub fn emit_job(job: JobId, m: &JobMetrics) {
    info!(
        %job,
        completed = m.completed,
        failed = m.failed,
        skipped = m.skipped,
        wall_us = m.wall.as_micros() as u64,
        "job finished"
    );
}
