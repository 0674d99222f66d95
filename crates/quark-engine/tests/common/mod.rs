//! Helpers shared by the event processor integration tests.

#![allow(dead_code)]

use quark_engine::{ActivityRegistry, JobConfig, SchedulePaths};
use quark_test_utils::{Journal, ScriptedSource};

/// A job over `source` with `lanes` schedules and as many threads, and no
/// signal listener.
pub fn job(source: ScriptedSource, lanes: usize) -> JobConfig {
    quark_engine::logging::init_for_tests();
    let mut config = JobConfig::new(source);
    config.scheduler.num_schedules = lanes;
    config.scheduler.num_threads = lanes;
    config.scheduler.enable_sig_int = false;
    config
}

/// A job whose schedules are all built by `paths`.
pub fn job_with_paths(
    source: ScriptedSource,
    lanes: usize,
    paths: impl Fn(quark_core::ScheduleId) -> SchedulePaths + Send + Sync + 'static,
) -> JobConfig {
    let mut config = job(source, lanes);
    config.paths = Box::new(paths);
    config
}

/// Activity registry journaling the level and output-file hooks.
///
/// Entries are the hook name, followed by the record where one is passed.
pub fn journaled_activity(journal: &Journal) -> ActivityRegistry {
    let mut activity = ActivityRegistry::new();

    let j = journal.clone();
    activity.post_begin_job.watch(move |_| j.push("post_begin_job"));
    let j = journal.clone();
    activity.post_end_job.watch(move |_| j.push("post_end_job"));
    let j = journal.clone();
    activity
        .post_open_file
        .watch(move |file| j.push(format!("post_open_file {file}")));
    let j = journal.clone();
    activity.post_close_file.watch(move |_| j.push("post_close_file"));
    let j = journal.clone();
    activity
        .pre_begin_run
        .watch(move |run| j.push(format!("pre_begin_run {}", run.id())));
    let j = journal.clone();
    activity
        .post_end_run
        .watch(move |run| j.push(format!("post_end_run {}", run.id())));
    let j = journal.clone();
    activity
        .pre_begin_subrun
        .watch(move |subrun| j.push(format!("pre_begin_subrun {}", subrun.id())));
    let j = journal.clone();
    activity
        .post_end_subrun
        .watch(move |subrun| j.push(format!("post_end_subrun {}", subrun.id())));
    let j = journal.clone();
    activity
        .post_open_output_file
        .watch(move |label| j.push(format!("post_open_output_file {label}")));
    let j = journal.clone();
    activity
        .post_close_output_file
        .watch(move |label| j.push(format!("post_close_output_file {label}")));
    let j = journal.clone();
    activity
        .on_abnormal_termination
        .watch(move |_| j.push("on_abnormal_termination"));

    activity
}
