//! Integration test: output-file switching.
//!
//! Outputs close their files when a closing criterion is met and reopen on
//! the next record. Every event must be written exactly once across all
//! files, and the run and sub-run fragments written to the files must
//! together cover exactly the events written.

mod common;

use quark_core::{
    ErrorCategory, EventId, EventPrincipal, EventRange, FileBlock, OutputModule,
    ProcessingError, RangeSet, RunId, RunPrincipal, SubRunId, SubRunPrincipal,
};
use quark_engine::{
    ErrorActionsConfig, EventProcessor, FileClosingCriteria, OutputSpec, SchedulePaths,
    StatusCode, TriggerPath,
};
use quark_test_utils::{FailingModifier, Journal, OutputLog, RecordingOutput, ScriptedSource};

fn run_job(source: ScriptedSource, lanes: usize, criteria: FileClosingCriteria) -> OutputLog {
    let (output, log) = RecordingOutput::new("out");
    let mut config = common::job(source, lanes);
    config.outputs.push(OutputSpec::new(output).with_criteria(criteria));
    let mut ep = EventProcessor::new(config).unwrap();
    assert_eq!(ep.run_to_completion().unwrap(), StatusCode::Success);
    log
}

fn ten_events() -> ScriptedSource {
    ScriptedSource::new().file("a").run(1).subrun(0).events(1..11)
}

fn range(begin: u32, end: u32) -> RangeSet {
    RangeSet::new(RunId::new(1), [EventRange::new(0, begin, end).unwrap()])
}

fn assert_written_once(log: &OutputLog, expected: usize) {
    let mut events = log.all_events();
    let total = events.len();
    events.sort();
    events.dedup();
    assert_eq!(events.len(), total, "an event was written twice");
    assert_eq!(total, expected);
}

#[test]
fn event_limit_splits_files_in_order() {
    let log = run_job(ten_events(), 1, FileClosingCriteria::events(4));
    let files = log.files();
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.closed));

    let numbers: Vec<Vec<u32>> = files
        .iter()
        .map(|f| f.events.iter().map(|e| e.event()).collect())
        .collect();
    assert_eq!(numbers, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]);

    let sr = SubRunId::new(1, 0);
    let subruns: Vec<&(SubRunId, RangeSet)> = files.iter().flat_map(|f| &f.subruns).collect();
    assert_eq!(
        subruns,
        vec![&(sr, range(1, 5)), &(sr, range(5, 9)), &(sr, range(9, 11))]
    );
    let runs: Vec<RangeSet> = files.iter().map(|f| f.runs[0].1.clone()).collect();
    assert_eq!(runs, vec![range(1, 5), range(5, 9), range(9, 11)]);
    assert_eq!(log.merged_run_ranges(RunId::new(1)).unwrap(), range(1, 11));
}

#[test]
fn closed_ranges_are_split_at_the_switch() {
    let source = ten_events().closed_ranges();
    let log = run_job(source, 1, FileClosingCriteria::events(4));
    let files = log.files();
    assert_eq!(files.len(), 3);
    let subrun_fragments: Vec<RangeSet> =
        files.iter().map(|f| f.subruns[0].1.clone()).collect();
    assert_eq!(
        subrun_fragments,
        vec![range(1, 5), range(5, 9), range(9, 11)]
    );
    let run_fragments: Vec<RangeSet> = files.iter().map(|f| f.runs[0].1.clone()).collect();
    assert_eq!(run_fragments, vec![range(1, 5), range(5, 9), range(9, 11)]);
}

#[test]
fn closed_ranges_without_switch_cover_the_whole_run() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..4)
        .subrun(1)
        .events(1..3)
        .closed_ranges();
    let log = run_job(source, 2, FileClosingCriteria::default());
    let file = &log.files()[0];
    assert_eq!(
        file.runs,
        vec![(
            RunId::new(1),
            RangeSet::new(
                RunId::new(1),
                [
                    EventRange::new(0, 1, 4).unwrap(),
                    EventRange::new(1, 1, 3).unwrap()
                ]
            )
        )]
    );
    assert_eq!(file.subruns[1].1.event_count(), 2);
}

#[test]
fn concurrent_switching_writes_each_event_once() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..101)
        .subrun(1)
        .events(1..51);
    let log = run_job(source, 4, FileClosingCriteria::events(16));
    assert_written_once(&log, 150);
    assert!(log.file_count() >= 2);

    let merged = log.merged_run_ranges(RunId::new(1)).unwrap();
    assert_eq!(merged.event_count(), 150);
    assert_eq!(
        merged,
        RangeSet::new(
            RunId::new(1),
            [
                EventRange::new(0, 1, 101).unwrap(),
                EventRange::new(1, 1, 51).unwrap()
            ]
        )
    );
    for file in log.files() {
        let covered: u64 = file.runs.iter().map(|(_, r)| r.event_count()).sum();
        assert_eq!(
            covered,
            file.events.len() as u64,
            "run fragments cover exactly the events in their file"
        );
    }
}

#[test]
fn concurrent_closed_ranges_partition_the_run() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..61)
        .closed_ranges();
    let log = run_job(source, 4, FileClosingCriteria::events(10));
    assert_written_once(&log, 60);

    let mut total = 0;
    let mut merged = RangeSet::invalid();
    for file in log.files() {
        let fragment = &file.runs[0].1;
        assert!(fragment.has_disjoint_ranges());
        assert!(
            merged.ranges().iter().all(|r| !fragment
                .ranges()
                .iter()
                .any(|f| f.overlaps(r))),
            "fragments of different files overlap"
        );
        total += fragment.event_count();
        merged.merge(fragment).unwrap();
    }
    assert_eq!(total, 60);
    assert_eq!(merged, range(1, 61));
}

#[test]
fn input_file_limit_switches_at_file_boundaries() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..4)
        .file("b")
        .run(1)
        .subrun(1)
        .events(1..3)
        .file("c")
        .run(2)
        .subrun(0)
        .event(1);
    let log = run_job(source, 1, FileClosingCriteria::input_files(1));
    let files = log.files();
    assert_eq!(
        files.iter().map(|f| f.input_file.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
    assert_eq!(
        files.iter().map(|f| f.events.len()).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );
    assert_eq!(
        log.merged_run_ranges(RunId::new(1)).unwrap(),
        RangeSet::new(
            RunId::new(1),
            [
                EventRange::new(0, 1, 4).unwrap(),
                EventRange::new(1, 1, 3).unwrap()
            ]
        )
    );
}

#[test]
fn switch_hooks_fire_per_file() {
    let journal = Journal::new();
    let (output, log) = RecordingOutput::new("out");
    let mut config = common::job(ten_events(), 1);
    config.activity = common::journaled_activity(&journal);
    config
        .outputs
        .push(OutputSpec::new(output).with_criteria(FileClosingCriteria::events(5)));
    let mut ep = EventProcessor::new(config).unwrap();
    ep.run_to_completion().unwrap();

    assert_eq!(log.file_count(), 2);
    assert_eq!(journal.matching("post_open_output_file").len(), 2);
    assert_eq!(journal.matching("post_close_output_file").len(), 2);
    assert_eq!(ep.summary().output_files, 2);
    assert_eq!(log.files()[1].events[0], EventId::new(1, 0, 6));
}

#[test]
fn skipped_last_event_still_closes_its_subrun_range() {
    let source = ScriptedSource::new()
        .file("a")
        .run(1)
        .subrun(0)
        .events(1..6)
        .subrun(1)
        .events(1..4)
        .closed_ranges();
    let mut config = common::job_with_paths(source, 1, |_| {
        SchedulePaths::new().path(TriggerPath::new("p").with(FailingModifier::new(
            "bad",
            ErrorCategory::DataCorruption,
            [5],
        )))
    });
    config.scheduler.error_actions = ErrorActionsConfig {
        skip_event: vec!["DataCorruption".into()],
        ..ErrorActionsConfig::default()
    };
    let (output, log) = RecordingOutput::new("out");
    config
        .outputs
        .push(OutputSpec::new(output).with_criteria(FileClosingCriteria::subruns(1)));
    let mut ep = EventProcessor::new(config).unwrap();
    assert_eq!(ep.run_to_completion().unwrap(), StatusCode::Success);

    let files = log.files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].events.len(), 4);
    let subrun = |s: u32, b: u32, e: u32| {
        RangeSet::new(RunId::new(1), [EventRange::new(s, b, e).unwrap()])
    };
    assert_eq!(files[0].subruns, vec![(SubRunId::new(1, 0), subrun(0, 1, 6))]);
    assert_eq!(files[0].runs, vec![(RunId::new(1), subrun(0, 1, 6))]);
    assert_eq!(files[1].subruns, vec![(SubRunId::new(1, 1), subrun(1, 1, 4))]);
    assert_eq!(files[1].runs, vec![(RunId::new(1), subrun(1, 1, 4))]);
    assert_eq!(ep.summary().events_skipped, 1);
}

/// Fails the write of one event number, once.
struct FlakyOutput {
    inner: RecordingOutput,
    fail_on: u32,
    failed: bool,
}

impl OutputModule for FlakyOutput {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn open_file(&mut self, input: &FileBlock) -> Result<(), ProcessingError> {
        self.inner.open_file(input)
    }

    fn close_file(&mut self) -> Result<(), ProcessingError> {
        self.inner.close_file()
    }

    fn write_event(&mut self, event: &EventPrincipal) -> Result<(), ProcessingError> {
        if !self.failed && event.id().event() == self.fail_on {
            self.failed = true;
            return Err(ProcessingError::new(
                ErrorCategory::FileWriteError,
                format!("disk full writing {}", event.id()),
            ));
        }
        self.inner.write_event(event)
    }

    fn write_subrun(&mut self, subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        self.inner.write_subrun(subrun)
    }

    fn write_run(&mut self, run: &RunPrincipal) -> Result<(), ProcessingError> {
        self.inner.write_run(run)
    }
}

#[test]
fn ignored_write_failure_keeps_switching_on_schedule() {
    let (inner, log) = RecordingOutput::new("out");
    let output = FlakyOutput {
        inner,
        fail_on: 2,
        failed: false,
    };
    let mut config = common::job(ten_events(), 1);
    config.scheduler.error_actions = ErrorActionsConfig {
        ignore_completely: vec!["FileWriteError".into()],
        ..ErrorActionsConfig::default()
    };
    config
        .outputs
        .push(OutputSpec::new(output).with_criteria(FileClosingCriteria::events(4)));
    let mut ep = EventProcessor::new(config).unwrap();
    assert_eq!(ep.run_to_completion().unwrap(), StatusCode::Success);

    let files = log.files();
    let numbers: Vec<Vec<u32>> = files
        .iter()
        .map(|f| f.events.iter().map(|e| e.event()).collect())
        .collect();
    assert_eq!(numbers, vec![vec![1, 3, 4, 5], vec![6, 7, 8, 9], vec![10]]);
    let runs: Vec<RangeSet> = files.iter().map(|f| f.runs[0].1.clone()).collect();
    assert_eq!(runs, vec![range(1, 6), range(6, 10), range(10, 11)]);
    assert_eq!(ep.summary().events_written, 9);
}
