//! Job-level counters and the end-of-job summary.
//!
//! Every [`Schedule`] keeps its own [`ScheduleCounters`]; at end of job the
//! processor folds them into one [`JobSummary`] and, when enabled, logs it.

use std::time::{Duration, Instant};

use tracing::info;

use crate::schedule::{PathStatus, Schedule, TriggerResults};

/// Outcome counts of one trigger path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathCounters {
    /// Events the path ran on.
    pub run: u64,
    /// Events the path accepted.
    pub passed: u64,
    /// Events a filter on the path rejected.
    pub rejected: u64,
    /// Events on which the path failed.
    pub failed: u64,
}

/// Activity counts of one schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleCounters {
    /// Non-flush events handed to the schedule.
    pub events_read: u64,
    /// Flush events handed to the schedule.
    pub flush_events: u64,
    /// Events that completed every trigger path.
    pub events_run: u64,
    /// Events accepted by at least one path (or with no paths).
    pub events_passed: u64,
    /// Events no path accepted.
    pub events_rejected: u64,
    /// Events abandoned under the `SkipEvent` action.
    pub events_skipped: u64,
    /// Events sent to the outputs.
    pub events_written: u64,
    /// Per-path counts, in path order.
    pub paths: Vec<PathCounters>,
}

impl ScheduleCounters {
    pub(crate) fn with_paths(n: usize) -> Self {
        Self {
            paths: vec![PathCounters::default(); n],
            ..Self::default()
        }
    }

    pub(crate) fn record_trigger_results(&mut self, results: &TriggerResults) {
        self.events_run += 1;
        if results.accept() {
            self.events_passed += 1;
        } else {
            self.events_rejected += 1;
        }
        for (counters, status) in self.paths.iter_mut().zip(results.statuses()) {
            counters.run += 1;
            match status {
                PathStatus::Accepted => counters.passed += 1,
                PathStatus::Rejected => counters.rejected += 1,
                PathStatus::Failed => counters.failed += 1,
            }
        }
    }
}

/// Totals of one trigger path across every schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathSummary {
    /// Path name.
    pub name: String,
    /// Summed counts.
    pub counters: PathCounters,
}

/// Totals for the whole job.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobSummary {
    /// Number of schedules.
    pub schedules: usize,
    /// Non-flush events read.
    pub events_read: u64,
    /// Flush events read.
    pub flush_events: u64,
    /// Events that completed every trigger path.
    pub events_run: u64,
    /// Events accepted.
    pub events_passed: u64,
    /// Events rejected by every path.
    pub events_rejected: u64,
    /// Events skipped under the `SkipEvent` action.
    pub events_skipped: u64,
    /// Events sent to the outputs.
    pub events_written: u64,
    /// Per-path totals, in path order.
    pub paths: Vec<PathSummary>,
    /// Input files closed.
    pub input_files: u64,
    /// Output files opened.
    pub output_files: u64,
    /// Time from begin of job to end of job.
    pub wall_time: Duration,
}

impl JobSummary {
    /// Add one schedule's counters.
    pub(crate) fn accumulate(&mut self, schedule: &Schedule) {
        let c = schedule.counters();
        self.schedules += 1;
        self.events_read += c.events_read;
        self.flush_events += c.flush_events;
        self.events_run += c.events_run;
        self.events_passed += c.events_passed;
        self.events_rejected += c.events_rejected;
        self.events_skipped += c.events_skipped;
        self.events_written += c.events_written;
        if self.paths.is_empty() {
            self.paths = schedule
                .path_names()
                .into_iter()
                .map(|name| PathSummary {
                    name: name.to_string(),
                    counters: PathCounters::default(),
                })
                .collect();
        }
        for (total, path) in self.paths.iter_mut().zip(&c.paths) {
            total.counters.run += path.run;
            total.counters.passed += path.passed;
            total.counters.rejected += path.rejected;
            total.counters.failed += path.failed;
        }
    }

    /// Log the summary at `info`.
    pub fn log(&self) {
        info!(
            schedules = self.schedules,
            read = self.events_read,
            run = self.events_run,
            passed = self.events_passed,
            rejected = self.events_rejected,
            skipped = self.events_skipped,
            written = self.events_written,
            input_files = self.input_files,
            output_files = self.output_files,
            wall_ms = self.wall_time.as_millis() as u64,
            "trigger report"
        );
        for path in &self.paths {
            info!(
                path = %path.name,
                run = path.counters.run,
                passed = path.counters.passed,
                rejected = path.counters.rejected,
                failed = path.counters.failed,
                "path report"
            );
        }
    }
}

/// Wall-clock timer started at begin of job and stopped at end of job.
#[derive(Debug, Default)]
pub(crate) struct JobTimer {
    started: Option<Instant>,
    elapsed: Duration,
}

impl JobTimer {
    pub(crate) fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub(crate) fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.elapsed + self.started.map_or(Duration::ZERO, |s| s.elapsed())
    }
}
