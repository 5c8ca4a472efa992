//! Timing helpers for stage durations

use std::time::{Duration, Instant};

use crate::metrics::catalog::STAGE_DURATION_SECONDS;

/// A timing guard that records the stage duration when dropped
///
/// RAII keeps the measurement correct on early returns via `?`.
pub struct TimingGuard {
    start: Instant,
    stage: &'static str,
}

impl TimingGuard {
    pub fn new(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish the timing now instead of at end of scope
    pub fn finish(self) {}
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        ::metrics::histogram!(STAGE_DURATION_SECONDS, "stage" => self.stage).record(duration);
    }
}

/// Convenience function to create a timing guard
///
/// ```rust
/// let _timing = retail_report::metrics::time_stage("load");
/// // ... do work ...
/// ```
pub fn time_stage(stage: &'static str) -> TimingGuard {
    TimingGuard::new(stage)
}
