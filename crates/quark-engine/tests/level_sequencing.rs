//! Integration test: the level state machine.
//!
//! Drives scripted inputs through a single schedule and checks the order of
//! begin/end transitions seen by modules and hooks, the treatment of flush
//! records, and the empty-run and empty-sub-run switches.

mod common;

use proptest::prelude::*;
use quark_core::{ErrorCategory, EventId, RunId, SubRunId};
use quark_engine::{EventProcessor, OutputSpec, SchedulePaths, StatusCode};
use quark_test_utils::{Journal, RecordingOutput, ScriptedSource, TransitionRecorder};

fn recorded_job(source: ScriptedSource, journal: &Journal) -> quark_engine::JobConfig {
    let journal = journal.clone();
    common::job_with_paths(source, 1, move |_| {
        SchedulePaths::new().observer(TransitionRecorder::new("recorder", journal.clone()))
    })
}

#[test]
fn transitions_nest_in_source_order() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..3)
        .subrun(1)
        .event(1)
        .run(2)
        .subrun(0)
        .event(7);
    let journal = Journal::new();
    let mut ep = EventProcessor::new(recorded_job(source, &journal)).unwrap();
    assert_eq!(ep.run_to_completion().unwrap(), StatusCode::Success);

    let run1 = RunId::new(1);
    let run2 = RunId::new(2);
    let sr10 = SubRunId::new(1, 0);
    let sr11 = SubRunId::new(1, 1);
    let sr20 = SubRunId::new(2, 0);
    let expected = vec![
        "begin_job".to_string(),
        format!("begin_run {run1}"),
        format!("begin_subrun {sr10}"),
        format!("event {}", EventId::new(1, 0, 1)),
        format!("event {}", EventId::new(1, 0, 2)),
        format!("end_subrun {sr10}"),
        format!("begin_subrun {sr11}"),
        format!("event {}", EventId::new(1, 1, 1)),
        format!("end_subrun {sr11}"),
        format!("end_run {run1}"),
        format!("begin_run {run2}"),
        format!("begin_subrun {sr20}"),
        format!("event {}", EventId::new(2, 0, 7)),
        format!("end_subrun {sr20}"),
        format!("end_run {run2}"),
        "end_job".to_string(),
    ];
    assert_eq!(journal.entries(), expected);
    assert_eq!(ep.summary().events_read, 4);
    assert_eq!(ep.summary().input_files, 1);
}

#[test]
fn hooks_bracket_the_hierarchy() {
    let source = ScriptedSource::new().file("a").run(1).subrun(0).event(1);
    let journal = Journal::new();
    let (output, _log) = RecordingOutput::new("out");
    let mut config = common::job(source, 1);
    config.activity = common::journaled_activity(&journal);
    config.outputs.push(OutputSpec::new(output));
    let mut ep = EventProcessor::new(config).unwrap();
    ep.run_to_completion().unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "post_begin_job".to_string(),
            "post_open_file a".to_string(),
            format!("pre_begin_run {}", RunId::new(1)),
            format!("pre_begin_subrun {}", SubRunId::new(1, 0)),
            "post_open_output_file out".to_string(),
            format!("post_end_subrun {}", SubRunId::new(1, 0)),
            format!("post_end_run {}", RunId::new(1)),
            "post_close_output_file out".to_string(),
            "post_close_file".to_string(),
            "post_end_job".to_string(),
        ]
    );
}

#[test]
fn records_reach_the_output() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..4)
        .subrun(1)
        .event(1);
    let (output, log) = RecordingOutput::new("out");
    let mut config = common::job(source, 1);
    config.outputs.push(OutputSpec::new(output));
    let mut ep = EventProcessor::new(config).unwrap();
    ep.run_to_completion().unwrap();

    let files = log.files();
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert!(file.closed);
    assert_eq!(file.input_file, "a");
    assert_eq!(file.events.len(), 4);
    assert_eq!(
        file.subruns
            .iter()
            .map(|(id, ranges)| (*id, ranges.event_count()))
            .collect::<Vec<_>>(),
        vec![(SubRunId::new(1, 0), 3), (SubRunId::new(1, 1), 1)]
    );
    assert_eq!(file.runs.len(), 1);
    assert_eq!(file.runs[0].1.event_count(), 4);
    assert_eq!(ep.summary().output_files, 1);
}

#[test]
fn flush_records_are_not_begun() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .event(1)
        .flush_run()
        .flush_subrun()
        .flush_event();
    let journal = Journal::new();
    let (output, log) = RecordingOutput::new("out");
    let mut config = recorded_job(source, &journal);
    config.outputs.push(OutputSpec::new(output));
    let mut ep = EventProcessor::new(config).unwrap();
    assert_eq!(ep.run_to_completion().unwrap(), StatusCode::Success);

    assert_eq!(journal.matching("begin_run").len(), 1);
    assert_eq!(journal.matching("begin_subrun").len(), 1);
    assert_eq!(journal.matching("event").len(), 1);
    assert_eq!(log.all_events(), vec![EventId::new(1, 0, 1)]);
    let file = &log.files()[0];
    assert_eq!(file.runs.len(), 1, "flush run is never written");
    assert_eq!(file.subruns.len(), 1, "flush sub-run is never written");
    assert_eq!(ep.summary().flush_events, 1);
    assert_eq!(ep.summary().events_read, 1);
}

#[test]
fn empty_runs_are_skipped_when_disabled() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .run(2)
        .subrun(0)
        .subrun(1)
        .event(1);
    let journal = Journal::new();
    let mut config = recorded_job(source, &journal);
    config.scheduler.handle_empty_runs = false;
    config.scheduler.handle_empty_subruns = false;
    let mut ep = EventProcessor::new(config).unwrap();
    ep.run_to_completion().unwrap();

    assert_eq!(
        journal.entries(),
        vec![
            "begin_job".to_string(),
            format!("begin_run {}", RunId::new(2)),
            format!("begin_subrun {}", SubRunId::new(2, 1)),
            format!("event {}", EventId::new(2, 1, 1)),
            format!("end_subrun {}", SubRunId::new(2, 1)),
            format!("end_run {}", RunId::new(2)),
            "end_job".to_string(),
        ]
    );
}

#[test]
fn empty_runs_are_begun_by_default() {
    let source = ScriptedSource::new().file("a").run(1).run(2).subrun(0);
    let journal = Journal::new();
    let mut ep = EventProcessor::new(recorded_job(source, &journal)).unwrap();
    ep.run_to_completion().unwrap();

    assert_eq!(journal.matching("begin_run").len(), 2);
    assert_eq!(journal.matching("end_run").len(), 2);
    assert_eq!(journal.matching("begin_subrun").len(), 1);
    assert_eq!(journal.matching("end_subrun").len(), 1);
}

#[test]
fn run_outside_a_file_is_a_logic_error() {
    let source = ScriptedSource::new().run(1).subrun(0).event(1);
    let mut ep = EventProcessor::new(common::job(source, 1)).unwrap();
    let failure = ep.run_to_completion().unwrap_err();
    assert_eq!(failure.category(), ErrorCategory::LogicError);
    assert!(failure.to_string().contains("Incorrect level hierarchy"));
}

#[test]
fn invalid_item_ends_the_job() {
    let source = ScriptedSource::new().file("a").run(1).invalid();
    let journal = Journal::new();
    let mut config = common::job(source, 1);
    config.activity = common::journaled_activity(&journal);
    let mut ep = EventProcessor::new(config).unwrap();
    let failure = ep.run_to_completion().unwrap_err();
    assert_eq!(failure.category(), ErrorCategory::LogicError);
    assert!(journal.contains("on_abnormal_termination"));
}

// ── Property: arbitrary well-formed hierarchies ─────────────────────

/// Files of runs of sub-runs, each sub-run holding an event count.
type Layout = Vec<Vec<Vec<u32>>>;

fn layout() -> impl Strategy<Value = Layout> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec(0u32..4, 0..3), 0..3),
        1..3,
    )
}

fn script(layout: &Layout) -> (ScriptedSource, Vec<String>) {
    let mut source = ScriptedSource::new();
    let mut expected = vec!["begin_job".to_string()];
    let mut run_number = 0;
    for (f, runs) in layout.iter().enumerate() {
        source = source.file(format!("file{f}"));
        for subruns in runs {
            run_number += 1;
            let run = RunId::new(run_number);
            source = source.run(run_number);
            expected.push(format!("begin_run {run}"));
            for (s, &events) in subruns.iter().enumerate() {
                let subrun = SubRunId::new(run_number, s as u32);
                source = source.subrun(s as u32).events(1..events + 1);
                expected.push(format!("begin_subrun {subrun}"));
                for e in 1..=events {
                    expected.push(format!("event {}", EventId::new(run_number, s as u32, e)));
                }
                expected.push(format!("end_subrun {subrun}"));
            }
            expected.push(format!("end_run {run}"));
        }
    }
    expected.push("end_job".to_string());
    (source, expected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_hierarchy_is_walked_in_order(layout in layout()) {
        let (source, expected) = script(&layout);
        let journal = Journal::new();
        let mut ep = EventProcessor::new(recorded_job(source, &journal)).unwrap();
        prop_assert_eq!(ep.run_to_completion().unwrap(), StatusCode::Success);
        prop_assert_eq!(journal.entries(), expected);
        prop_assert_eq!(ep.summary().input_files, layout.len() as u64);
        let events: u64 = layout.iter().flatten().flatten().map(|&n| u64::from(n)).sum();
        prop_assert_eq!(ep.summary().events_read, events);
        prop_assert_eq!(ep.summary().schedules, 1);
    }
}
