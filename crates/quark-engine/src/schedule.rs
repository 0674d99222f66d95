//! Schedules: one independent execution lane each.
//!
//! A [`Schedule`] owns its own instances of every module (trigger paths of
//! [`Modifier`]s and the end path of [`Observer`]s), the event principal it
//! is currently processing, and its own run and sub-run range-set handlers.
//! Output modules are shared through the [`OutputHub`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use quark_core::{
    ActionTable, ErrorAction, ErrorCategory, EventPrincipal, Failure, Modifier, Observer,
    ProcessingError, ProductDescription, RangeSet, RangeSetHandler, RunPrincipal, ScheduleId,
    SubRunPrincipal, Transition,
};
use tracing::warn;

use crate::exception::{guarded, ExceptionCollector};
use crate::output::{OutputFileStatus, OutputHub};
use crate::summary::ScheduleCounters;

// ── Module workers ─────────────────────────────────────────────────

struct ModuleWorker<M: ?Sized> {
    label: String,
    module: Box<M>,
}

impl ModuleWorker<dyn Modifier> {
    fn modifier(module: Box<dyn Modifier>) -> Self {
        Self {
            label: module.label().to_string(),
            module,
        }
    }
}

impl ModuleWorker<dyn Observer> {
    fn observer(module: Box<dyn Observer>) -> Self {
        Self {
            label: module.label().to_string(),
            module,
        }
    }
}

fn module_failure(label: &str, during: &str, cause: ProcessingError) -> Failure {
    Failure::Processing(ProcessingError::wrap(
        ErrorCategory::ScheduleExecutionFailure,
        format!("module '{label}' failed during {during}"),
        cause,
    ))
}

// ── Trigger paths ──────────────────────────────────────────────────

/// Outcome of one trigger path for one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathStatus {
    /// Every module passed.
    Accepted,
    /// A filter rejected the event.
    Rejected,
    /// A module failed and the error action was `FailPath`.
    Failed,
}

/// Per-path outcomes for one event, in path order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerResults {
    statuses: Vec<PathStatus>,
}

impl TriggerResults {
    /// Outcomes in path order.
    pub fn statuses(&self) -> &[PathStatus] {
        &self.statuses
    }

    /// Whether the event should be written: there are no trigger paths,
    /// or at least one accepted it.
    pub fn accept(&self) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&PathStatus::Accepted)
    }
}

/// A named sequence of modifiers run in order for every event.
pub struct TriggerPath {
    name: String,
    workers: Vec<ModuleWorker<dyn Modifier>>,
}

impl TriggerPath {
    /// Empty path called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
        }
    }

    /// Append a module.
    pub fn with(self, module: impl Modifier + 'static) -> Self {
        self.with_boxed(Box::new(module))
    }

    /// Append an already boxed module.
    pub fn with_boxed(mut self, module: Box<dyn Modifier>) -> Self {
        self.workers.push(ModuleWorker::<dyn Modifier>::modifier(module));
        self
    }

    /// Path name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels of the path's modules, in order.
    pub fn module_labels(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.label.as_str()).collect()
    }

    fn process(
        &mut self,
        event: &mut EventPrincipal,
        actions: &ActionTable,
    ) -> Result<PathStatus, Failure> {
        for worker in &mut self.workers {
            let ModuleWorker { label, module } = worker;
            match guarded(label, || module.process(event))? {
                Ok(true) => {}
                Ok(false) => return Ok(PathStatus::Rejected),
                Err(e) => match actions.classify(&e) {
                    ErrorAction::FailModule => {
                        warn!(
                            module = %label,
                            path = %self.name,
                            category = %e.root_category(),
                            "module failure treated as pass: {e}"
                        );
                    }
                    ErrorAction::FailPath => {
                        warn!(
                            module = %label,
                            path = %self.name,
                            category = %e.root_category(),
                            "failing path: {e}"
                        );
                        return Ok(PathStatus::Failed);
                    }
                    _ => return Err(module_failure(label, "event processing", e)),
                },
            }
        }
        Ok(PathStatus::Accepted)
    }
}

impl fmt::Debug for TriggerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerPath")
            .field("name", &self.name)
            .field("modules", &self.module_labels())
            .finish()
    }
}

/// The modules of one schedule, built by the job's path factory.
#[derive(Default)]
pub struct SchedulePaths {
    /// Trigger paths, run in order.
    pub trigger_paths: Vec<TriggerPath>,
    /// End-path observers, run in order after every trigger path.
    pub observers: Vec<Box<dyn Observer>>,
}

impl SchedulePaths {
    /// No paths and no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trigger path.
    pub fn path(mut self, path: TriggerPath) -> Self {
        self.trigger_paths.push(path);
        self
    }

    /// Append an observer.
    pub fn observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

// ── Schedule ───────────────────────────────────────────────────────

/// One execution lane.
pub struct Schedule {
    id: ScheduleId,
    paths: Vec<TriggerPath>,
    observers: Vec<ModuleWorker<dyn Observer>>,
    actions: ActionTable,
    outputs: Arc<OutputHub>,
    run_rsh: Option<RangeSetHandler>,
    subrun_rsh: Option<RangeSetHandler>,
    run_aux_ranges: RangeSet,
    subrun_aux_ranges: RangeSet,
    file_status: OutputFileStatus,
    event: Option<EventPrincipal>,
    trigger_results: Option<TriggerResults>,
    counters: ScheduleCounters,
}

impl Schedule {
    pub(crate) fn new(
        id: ScheduleId,
        paths: SchedulePaths,
        actions: ActionTable,
        outputs: Arc<OutputHub>,
    ) -> Self {
        let counters = ScheduleCounters::with_paths(paths.trigger_paths.len());
        Self {
            id,
            paths: paths.trigger_paths,
            observers: paths
                .observers
                .into_iter()
                .map(ModuleWorker::<dyn Observer>::observer)
                .collect(),
            actions,
            outputs,
            run_rsh: None,
            subrun_rsh: None,
            run_aux_ranges: RangeSet::invalid(),
            subrun_aux_ranges: RangeSet::invalid(),
            file_status: OutputFileStatus::Open,
            event: None,
            trigger_results: None,
            counters,
        }
    }

    /// Lane index.
    pub fn id(&self) -> ScheduleId {
        self.id
    }

    /// Trigger path names, in order.
    pub fn path_names(&self) -> Vec<&str> {
        self.paths.iter().map(TriggerPath::name).collect()
    }

    /// Module labels of every trigger path, then the observers.
    pub fn layout(&self) -> Vec<Vec<&str>> {
        let mut layout: Vec<Vec<&str>> =
            self.paths.iter().map(TriggerPath::module_labels).collect();
        layout.push(self.observers.iter().map(|w| w.label.as_str()).collect());
        layout
    }

    /// Activity counters of this lane.
    pub fn counters(&self) -> &ScheduleCounters {
        &self.counters
    }

    /// Products declared by this lane's modifiers.
    pub(crate) fn produced_products(&self) -> Vec<ProductDescription> {
        self.paths
            .iter()
            .flat_map(|p| p.workers.iter())
            .flat_map(|w| w.module.produces())
            .collect()
    }

    // ── job and transitions ────────────────────────────────────────

    pub(crate) fn begin_job(&mut self) -> Result<(), Failure> {
        for worker in self.paths.iter_mut().flat_map(|p| p.workers.iter_mut()) {
            let ModuleWorker { label, module } = worker;
            guarded(label, || module.begin_job())?
                .map_err(|e| module_failure(label, "beginJob", e))?;
        }
        for ModuleWorker { label, module } in &mut self.observers {
            guarded(label, || module.begin_job())?
                .map_err(|e| module_failure(label, "beginJob", e))?;
        }
        Ok(())
    }

    pub(crate) fn end_job(&mut self) -> Result<(), Failure> {
        let mut collector = ExceptionCollector::default();
        for worker in self.paths.iter_mut().flat_map(|p| p.workers.iter_mut()) {
            let ModuleWorker { label, module } = worker;
            collector.call(label, || {
                module.end_job().map_err(|e| module_failure(label, "endJob", e))
            });
        }
        for ModuleWorker { label, module } in &mut self.observers {
            collector.call(label, || {
                module.end_job().map_err(|e| module_failure(label, "endJob", e))
            });
        }
        collector.into_result()
    }

    pub(crate) fn process_run(
        &mut self,
        transition: Transition,
        run: &mut RunPrincipal,
    ) -> Result<(), Failure> {
        let during = format!("{transition:?}");
        for worker in self.paths.iter_mut().flat_map(|p| p.workers.iter_mut()) {
            let ModuleWorker { label, module } = worker;
            guarded(label, || match transition {
                Transition::BeginRun => module.begin_run(run),
                Transition::EndRun => module.end_run(run),
                _ => Ok(()),
            })?
            .map_err(|e| module_failure(label, &during, e))?;
        }
        for ModuleWorker { label, module } in &mut self.observers {
            guarded(label, || match transition {
                Transition::BeginRun => module.begin_run(run),
                Transition::EndRun => module.end_run(run),
                _ => Ok(()),
            })?
            .map_err(|e| module_failure(label, &during, e))?;
        }
        Ok(())
    }

    pub(crate) fn process_subrun(
        &mut self,
        transition: Transition,
        subrun: &mut SubRunPrincipal,
    ) -> Result<(), Failure> {
        let during = format!("{transition:?}");
        for worker in self.paths.iter_mut().flat_map(|p| p.workers.iter_mut()) {
            let ModuleWorker { label, module } = worker;
            guarded(label, || match transition {
                Transition::BeginSubRun => module.begin_subrun(subrun),
                Transition::EndSubRun => module.end_subrun(subrun),
                _ => Ok(()),
            })?
            .map_err(|e| module_failure(label, &during, e))?;
        }
        for ModuleWorker { label, module } in &mut self.observers {
            guarded(label, || match transition {
                Transition::BeginSubRun => module.begin_subrun(subrun),
                Transition::EndSubRun => module.end_subrun(subrun),
                _ => Ok(()),
            })?
            .map_err(|e| module_failure(label, &during, e))?;
        }
        Ok(())
    }

    // ── events ─────────────────────────────────────────────────────

    /// Take ownership of the next event to process.
    pub(crate) fn accept_principal(&mut self, event: EventPrincipal) {
        if event.is_flush() {
            self.counters.flush_events += 1;
        } else {
            self.counters.events_read += 1;
        }
        self.trigger_results = None;
        self.event = Some(event);
    }

    pub(crate) fn event(&self) -> Option<&EventPrincipal> {
        self.event.as_ref()
    }

    pub(crate) fn release_event(&mut self) -> Option<EventPrincipal> {
        self.trigger_results = None;
        self.event.take()
    }

    /// Abandon the current event under the `SkipEvent` action. The event
    /// still counts toward the range sets of the current fragment.
    pub(crate) fn skip_event(&mut self) {
        self.counters.events_skipped += 1;
        if let Some(event) = self.event.take() {
            self.update_range_set_handlers(&event);
        }
        self.trigger_results = None;
    }

    /// Run every trigger path over the current event.
    pub(crate) fn process_event_modifiers(&mut self) -> Result<(), Failure> {
        let event = self
            .event
            .as_mut()
            .ok_or_else(|| ProcessingError::logic("no event principal to process"))?;
        let mut results = TriggerResults {
            statuses: Vec::with_capacity(self.paths.len()),
        };
        for path in &mut self.paths {
            results.statuses.push(path.process(event, &self.actions)?);
        }
        self.counters.record_trigger_results(&results);
        self.trigger_results = Some(results);
        Ok(())
    }

    /// Run the end-path observers over the current event.
    pub(crate) fn process_event_observers(&mut self) -> Result<(), Failure> {
        let event = self
            .event
            .as_ref()
            .ok_or_else(|| ProcessingError::logic("no event principal to observe"))?;
        for ModuleWorker { label, module } in &mut self.observers {
            guarded(label, || module.observe(event))?
                .map_err(|e| module_failure(label, "event observation", e))?;
        }
        Ok(())
    }

    /// Write the current event if accepted, and account for it in the
    /// range-set handlers whether or not the write succeeded.
    pub(crate) fn write_event(&mut self) -> Result<(), Failure> {
        let event = self
            .event
            .take()
            .ok_or_else(|| ProcessingError::logic("no event principal to write"))?;
        let accepted = self
            .trigger_results
            .as_ref()
            .map_or(true, TriggerResults::accept);
        let written = if accepted {
            self.outputs.write_event(&event)
        } else {
            Ok(())
        };
        if accepted && written.is_ok() {
            self.counters.events_written += 1;
        }
        self.update_range_set_handlers(&event);
        self.event = Some(event);
        written.map_err(Failure::from)
    }

    fn update_range_set_handlers(&mut self, event: &EventPrincipal) {
        let (id, last_in_subrun) = (event.id(), event.is_last_in_subrun());
        if let Some(rsh) = self.run_rsh.as_mut() {
            rsh.update(id, last_in_subrun);
        }
        if let Some(rsh) = self.subrun_rsh.as_mut() {
            rsh.update(id, last_in_subrun);
        }
    }

    // ── range sets ─────────────────────────────────────────────────

    pub(crate) fn seed_run_range_set(&mut self, rsh: RangeSetHandler) {
        self.run_rsh = Some(rsh);
    }

    pub(crate) fn seed_subrun_range_set(&mut self, rsh: RangeSetHandler) {
        self.subrun_rsh = Some(rsh);
    }

    pub(crate) fn run_range_set_handler(&self) -> Result<&RangeSetHandler, Failure> {
        self.run_rsh.as_ref().ok_or_else(|| {
            Failure::from(ProcessingError::logic(format!(
                "schedule {} has no run range-set handler",
                self.id
            )))
        })
    }

    pub(crate) fn subrun_range_set_handler(&self) -> Result<&RangeSetHandler, Failure> {
        self.subrun_rsh.as_ref().ok_or_else(|| {
            Failure::from(ProcessingError::logic(format!(
                "schedule {} has no subrun range-set handler",
                self.id
            )))
        })
    }

    pub(crate) fn rebase_range_set_handlers(&mut self) {
        if let Some(rsh) = self.run_rsh.as_mut() {
            rsh.rebase();
        }
        if let Some(rsh) = self.subrun_rsh.as_mut() {
            rsh.rebase();
        }
    }

    pub(crate) fn set_run_aux_range_set(&mut self, ranges: RangeSet) {
        self.run_aux_ranges = ranges;
    }

    pub(crate) fn set_subrun_aux_range_set(&mut self, ranges: RangeSet) {
        self.subrun_aux_ranges = ranges;
    }

    /// Ranges attached to the last run fragment written.
    pub fn run_aux_range_set(&self) -> &RangeSet {
        &self.run_aux_ranges
    }

    /// Ranges attached to the last sub-run fragment written.
    pub fn subrun_aux_range_set(&self) -> &RangeSet {
        &self.subrun_aux_ranges
    }

    // ── outputs ────────────────────────────────────────────────────

    /// Output-file state. Only meaningful on the primary schedule.
    pub fn file_status(&self) -> OutputFileStatus {
        self.file_status
    }

    pub(crate) fn set_output_file_status(&mut self, status: OutputFileStatus) {
        self.file_status = status;
    }

    pub(crate) fn record_output_closure_requests(&self, boundary: quark_core::Granularity) {
        self.outputs.record_output_closure_requests(boundary);
    }

    pub(crate) fn write_subrun(&self, subrun: &SubRunPrincipal) -> Result<(), Failure> {
        Ok(self.outputs.write_subrun(subrun)?)
    }

    pub(crate) fn write_run(&self, run: &RunPrincipal) -> Result<(), Failure> {
        Ok(self.outputs.write_run(run)?)
    }

    /// Close the outputs waiting to close and end the switch.
    pub(crate) fn close_some_output_files(&mut self) -> Result<Vec<String>, Failure> {
        let closed = self.outputs.close_some_output_files()?;
        self.file_status = OutputFileStatus::Open;
        Ok(closed)
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("id", &self.id)
            .field("paths", &self.paths)
            .field("file_status", &self.file_status)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

// ── ScheduleIteration ──────────────────────────────────────────────

/// Applies an operation to every schedule at a quiescent point.
pub(crate) struct ScheduleIteration<'a> {
    schedules: &'a [Mutex<Schedule>],
}

impl<'a> ScheduleIteration<'a> {
    pub(crate) fn new(schedules: &'a [Mutex<Schedule>]) -> Self {
        Self { schedules }
    }

    pub(crate) fn for_each_schedule(
        &self,
        mut f: impl FnMut(&mut Schedule) -> Result<(), Failure>,
    ) -> Result<(), Failure> {
        for schedule in self.schedules {
            f(&mut *schedule.lock())?;
        }
        Ok(())
    }

    pub(crate) fn try_fold<T>(
        &self,
        init: T,
        mut f: impl FnMut(T, &Schedule) -> Result<T, Failure>,
    ) -> Result<T, Failure> {
        let mut acc = init;
        for schedule in self.schedules {
            acc = f(acc, &*schedule.lock())?;
        }
        Ok(acc)
    }

    /// Index of the schedule whose handler saw the greatest event id.
    /// Ties and empty handlers resolve to the lowest index.
    pub(crate) fn index_of_latest_event(
        &self,
        handler: impl Fn(&Schedule) -> Result<&RangeSetHandler, Failure>,
    ) -> Result<usize, Failure> {
        let mut best: Option<(usize, quark_core::EventId)> = None;
        for (idx, schedule) in self.schedules.iter().enumerate() {
            let guard = schedule.lock();
            if let Some(last) = handler(&*guard)?.last_event() {
                if best.map_or(true, |(_, b)| last > b) {
                    best = Some((idx, last));
                }
            }
        }
        Ok(best.map_or(0, |(idx, _)| idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quark_core::{EventId, FileBlock, OutputModule, RunId};

    struct Pass(&'static str);
    impl Modifier for Pass {
        fn label(&self) -> &str {
            self.0
        }
        fn process(&mut self, _: &mut EventPrincipal) -> Result<bool, ProcessingError> {
            Ok(true)
        }
    }

    struct Reject;
    impl Modifier for Reject {
        fn label(&self) -> &str {
            "reject"
        }
        fn process(&mut self, _: &mut EventPrincipal) -> Result<bool, ProcessingError> {
            Ok(false)
        }
    }

    struct Fail(ErrorCategory);
    impl Modifier for Fail {
        fn label(&self) -> &str {
            "fail"
        }
        fn process(&mut self, _: &mut EventPrincipal) -> Result<bool, ProcessingError> {
            Err(ProcessingError::new(self.0, "boom"))
        }
    }

    struct CountingOutput(Arc<Mutex<u32>>);
    impl OutputModule for CountingOutput {
        fn label(&self) -> &str {
            "out"
        }
        fn open_file(&mut self, _: &FileBlock) -> Result<(), ProcessingError> {
            Ok(())
        }
        fn close_file(&mut self) -> Result<(), ProcessingError> {
            Ok(())
        }
        fn write_event(&mut self, _: &EventPrincipal) -> Result<(), ProcessingError> {
            *self.0.lock() += 1;
            Ok(())
        }
        fn write_subrun(&mut self, _: &SubRunPrincipal) -> Result<(), ProcessingError> {
            Ok(())
        }
        fn write_run(&mut self, _: &RunPrincipal) -> Result<(), ProcessingError> {
            Ok(())
        }
    }

    fn schedule(paths: SchedulePaths, actions: ActionTable) -> (Schedule, Arc<Mutex<u32>>) {
        let written = Arc::new(Mutex::new(0));
        let hub = Arc::new(OutputHub::new(vec![crate::config::OutputSpec::new(
            CountingOutput(Arc::clone(&written)),
        )]));
        hub.respond_to_open_input_file(FileBlock::new("in"));
        hub.open_some_output_files().unwrap();
        (Schedule::new(ScheduleId(0), paths, actions, hub), written)
    }

    fn run_event(s: &mut Schedule, n: u32) -> Result<(), Failure> {
        s.accept_principal(EventPrincipal::new(EventId::new(1, 0, n)));
        s.process_event_modifiers()?;
        s.process_event_observers()?;
        s.write_event()
    }

    #[test]
    fn event_written_when_any_path_accepts() {
        let paths = SchedulePaths::new()
            .path(TriggerPath::new("p1").with(Reject))
            .path(TriggerPath::new("p2").with(Pass("a")));
        let (mut s, written) = schedule(paths, ActionTable::new());
        run_event(&mut s, 1).unwrap();
        assert_eq!(*written.lock(), 1);
        assert_eq!(s.counters().events_passed, 1);
    }

    #[test]
    fn rejected_event_not_written_but_ranges_updated() {
        let paths = SchedulePaths::new().path(TriggerPath::new("p1").with(Reject));
        let (mut s, written) = schedule(paths, ActionTable::new());
        s.seed_subrun_range_set(RangeSetHandler::open(RunId::new(1)));
        run_event(&mut s, 4).unwrap();
        assert_eq!(*written.lock(), 0);
        assert_eq!(s.counters().events_rejected, 1);
        let seen = s.subrun_range_set_handler().unwrap().seen_ranges();
        assert!(seen.contains(1, 0, 4));
    }

    #[test]
    fn fail_path_marks_path_failed() {
        let paths = SchedulePaths::new()
            .path(TriggerPath::new("p1").with(Fail(ErrorCategory::DataCorruption)).with(Pass("b")));
        let actions = ActionTable::new().with(ErrorCategory::DataCorruption, ErrorAction::FailPath);
        let (mut s, written) = schedule(paths, actions);
        run_event(&mut s, 1).unwrap();
        assert_eq!(*written.lock(), 0);
        assert_eq!(s.counters().paths[0].failed, 1);
    }

    #[test]
    fn fail_module_continues_path() {
        let paths = SchedulePaths::new()
            .path(TriggerPath::new("p1").with(Fail(ErrorCategory::DataCorruption)).with(Pass("b")));
        let actions =
            ActionTable::new().with(ErrorCategory::DataCorruption, ErrorAction::FailModule);
        let (mut s, written) = schedule(paths, actions);
        run_event(&mut s, 1).unwrap();
        assert_eq!(*written.lock(), 1);
    }

    #[test]
    fn rethrow_wraps_with_schedule_failure() {
        let paths = SchedulePaths::new()
            .path(TriggerPath::new("p1").with(Fail(ErrorCategory::ProductNotFound)));
        let (mut s, _) = schedule(paths, ActionTable::new());
        s.accept_principal(EventPrincipal::new(EventId::new(1, 0, 1)));
        let failure = s.process_event_modifiers().unwrap_err();
        match &failure {
            Failure::Processing(e) => {
                assert_eq!(e.category(), ErrorCategory::ScheduleExecutionFailure);
                assert_eq!(e.root_category(), ErrorCategory::ProductNotFound);
            }
            other => panic!("expected Processing, got {other:?}"),
        }
    }

    #[test]
    fn processing_without_event_is_logic_error() {
        let (mut s, _) = schedule(SchedulePaths::new(), ActionTable::new());
        assert_eq!(
            s.process_event_modifiers().unwrap_err().category(),
            ErrorCategory::LogicError
        );
    }

    #[test]
    fn latest_event_index_prefers_greatest_id() {
        let hub = Arc::new(OutputHub::new(Vec::new()));
        let schedules: Vec<Mutex<Schedule>> = (0..3)
            .map(|i| {
                let mut s = Schedule::new(
                    ScheduleId(i),
                    SchedulePaths::new(),
                    ActionTable::new(),
                    Arc::clone(&hub),
                );
                s.seed_subrun_range_set(RangeSetHandler::closed(RangeSet::new(
                    RunId::new(1),
                    [quark_core::EventRange::new(0, 1, 20).unwrap()],
                )));
                Mutex::new(s)
            })
            .collect();
        for (i, n) in [(0usize, 3u32), (1, 9), (2, 5)] {
            let mut s = schedules[i].lock();
            s.accept_principal(EventPrincipal::new(EventId::new(1, 0, n)));
            s.write_event().unwrap();
        }
        let it = ScheduleIteration::new(&schedules);
        assert_eq!(it.index_of_latest_event(Schedule::subrun_range_set_handler).unwrap(), 1);
    }
}
