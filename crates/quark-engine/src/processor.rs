//! The event processor: level state machine and output-file switching.
//!
//! [`EventProcessor::run_to_completion`] walks the hierarchy announced by
//! the input source. Each level is begun, its children are processed while
//! the source keeps announcing them, and the level is finalized. At the
//! event level the work fans out to every schedule through the pump; the
//! driver waits for the burst to settle and carries out any output-file
//! switch the lanes flagged before resuming.
//!
//! Run and sub-run records are written to the outputs when they are
//! finalized. Their seen ranges are reconciled across schedules first:
//! merged for open range-set handlers, split at the latest event for
//! closed ones.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use indexmap::IndexSet;
use quark_core::{
    ErrorCategory, Failure, Granularity, HandlerKind, Level, ProcessingError, ProductTables,
    RangeSet, RangeSetHandler, ScheduleId, Transition,
};
use tracing::{debug, error, info};

use crate::config::{ConfigError, JobConfig, SchedulerConfig};
use crate::exception::{guarded, ExceptionCollector};
use crate::output::{OutputFileStatus, OutputHub};
use crate::pump::{self, EventLoop, InputCursor};
use crate::schedule::{Schedule, ScheduleIteration};
use crate::shutdown::{ShutdownFlag, SignalListener};
use crate::summary::{JobSummary, JobTimer};
use crate::task::TaskGroup;

/// How a job ended when no failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// All input was processed.
    Success,
    /// Processing stopped early because shutdown was requested.
    Signal,
}

/// Drives one job from begin to end.
pub struct EventProcessor {
    el: Arc<EventLoop>,
    tasks: TaskGroup,
    scheduler: SchedulerConfig,
    _signals: Option<SignalListener>,
    finalize_run_enabled: bool,
    finalize_subrun_enabled: bool,
    begin_run_called: bool,
    begin_subrun_called: bool,
    collector: ExceptionCollector,
    timer: JobTimer,
    summary: JobSummary,
    started: bool,
}

impl EventProcessor {
    /// Validate `config`, build one schedule per lane and start the task
    /// group and, if enabled, the signal listener.
    pub fn new(config: JobConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let JobConfig {
            scheduler,
            source,
            paths,
            outputs,
            activity,
        } = config;
        let actions = scheduler.error_actions.to_action_table()?;
        let hub = Arc::new(OutputHub::new(outputs));

        let schedules: Vec<Schedule> = (0..scheduler.num_schedules)
            .map(|i| {
                let sid = ScheduleId(i);
                Schedule::new(sid, paths(sid), actions.clone(), Arc::clone(&hub))
            })
            .collect();
        validate_layout(&schedules)?;
        let products = product_tables(&schedules[0])?;

        let tasks = TaskGroup::new(scheduler.resolved_thread_count()).map_err(|e| {
            ConfigError::ThreadSpawnFailed {
                reason: format!("task group: {e}"),
            }
        })?;
        let shutdown = ShutdownFlag::new();
        let signals = if scheduler.enable_sig_int {
            Some(SignalListener::spawn(shutdown.clone()).map_err(|e| {
                ConfigError::ThreadSpawnFailed {
                    reason: format!("signal listener: {e}"),
                }
            })?)
        } else {
            None
        };

        info!(
            schedules = scheduler.num_schedules,
            threads = tasks.num_threads(),
            outputs = hub.len(),
            products = products.len(),
            "event processor configured"
        );

        let el = Arc::new(EventLoop::new(
            source, schedules, hub, activity, actions, products, shutdown,
        ));
        Ok(Self {
            el,
            tasks,
            scheduler,
            _signals: signals,
            finalize_run_enabled: false,
            finalize_subrun_enabled: false,
            begin_run_called: false,
            begin_subrun_called: false,
            collector: ExceptionCollector::default(),
            timer: JobTimer::default(),
            summary: JobSummary::default(),
            started: false,
        })
    }

    /// The job's shutdown flag. Requesting shutdown stops processing at the
    /// next checkpoint.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.el.shutdown.clone()
    }

    /// Number of schedules.
    pub fn num_schedules(&self) -> usize {
        self.el.schedules.len()
    }

    /// Counters of the finished job. Empty before the job ends.
    pub fn summary(&self) -> &JobSummary {
        &self.summary
    }

    /// Process all input. May only be called once.
    ///
    /// On failure the abnormal-termination hooks run and the first failure
    /// raised is returned.
    pub fn run_to_completion(&mut self) -> Result<StatusCode, Failure> {
        if self.started {
            return Err(ProcessingError::logic("run_to_completion may only be called once").into());
        }
        self.started = true;

        self.process(Level::Job);

        if let Some(failure) = self.collector.take() {
            error!(%failure, category = %failure.category(), "job terminated abnormally");
            let el = Arc::clone(&self.el);
            if let Err(hook) = guarded("abnormal termination hook", || {
                el.activity.on_abnormal_termination.invoke(&())
            }) {
                error!(%hook, "abnormal termination hook failed");
            }
            return Err(failure);
        }
        let status = if self.el.shutdown.is_requested() {
            StatusCode::Signal
        } else {
            StatusCode::Success
        };
        info!(?status, "job finished");
        Ok(status)
    }

    // ── level machine ──────────────────────────────────────────────

    fn should_stop(&self) -> bool {
        self.el.shutdown.is_requested() || !self.collector.is_empty()
    }

    /// Run `f` and collect its failure, converting a panic.
    fn step(&mut self, what: &str, f: impl FnOnce(&mut Self) -> Result<(), Failure>) {
        let result = guarded(what, || f(&mut *self)).and_then(|r| r);
        self.collector.collect(result);
    }

    fn process(&mut self, level: Level) {
        let Some(child) = level.level_down() else {
            self.step("event processing", Self::process_events);
            return;
        };
        self.step(level.name(), |p| p.begin(level));
        while !self.should_stop() {
            match self.levels_to_process(child) {
                Ok(true) => self.process(child),
                Ok(false) => break,
                Err(failure) => {
                    self.collector.collect(Err(failure));
                    break;
                }
            }
        }
        self.step(level.name(), |p| {
            p.finalize(level)?;
            p.record_output_closure_requests(level);
            Ok(())
        });
    }

    /// Whether the source announced `level` next. Consumes the
    /// announcement and carries out a pending output-file switch.
    fn levels_to_process(&mut self, level: Level) -> Result<bool, Failure> {
        let next = self.el.input.lock().next_level()?;
        if next == level {
            self.el.input.lock().next_level = None;
            if self.el.outputs.outputs_to_close() {
                info!(%level, "switching output files");
                self.set_main_file_status(OutputFileStatus::Switching);
                self.finalize_containing_levels(level)?;
                self.close_some_output_files()?;
            }
            return Ok(true);
        }
        if next < level {
            return Ok(false);
        }
        Err(ProcessingError::logic(format!(
            "Incorrect level hierarchy: {next} cannot follow {level}"
        ))
        .into())
    }

    fn begin(&mut self, level: Level) -> Result<(), Failure> {
        match level {
            Level::Job => self.begin_job(),
            Level::InputFile => self.open_input_file(),
            Level::Run => {
                self.read_run()?;
                self.finalize_run_enabled = true;
                if self.scheduler.handle_empty_runs {
                    self.begin_run()?;
                }
                Ok(())
            }
            Level::SubRun => {
                self.read_subrun()?;
                self.finalize_subrun_enabled = true;
                if self.scheduler.handle_empty_subruns {
                    self.begin_run_if_not_done()?;
                    self.begin_subrun()?;
                }
                Ok(())
            }
            Level::Event => Ok(()),
        }
    }

    fn finalize(&mut self, level: Level) -> Result<(), Failure> {
        match level {
            Level::Job => self.end_job(),
            Level::InputFile => {
                if self.el.input.lock().next_level == Some(Level::Job) {
                    self.close_all_files()
                } else {
                    self.close_input_file()
                }
            }
            Level::Run => self.finalize_run(),
            Level::SubRun => self.finalize_subrun(),
            Level::Event => Ok(()),
        }
    }

    fn finalize_containing_levels(&mut self, level: Level) -> Result<(), Failure> {
        match level {
            Level::SubRun => self.finalize_run(),
            Level::Event => {
                self.finalize_subrun()?;
                self.finalize_run()
            }
            Level::Job | Level::InputFile | Level::Run => Ok(()),
        }
    }

    fn record_output_closure_requests(&self, level: Level) {
        let boundary = match level {
            Level::Run => Granularity::Run,
            Level::SubRun => Granularity::SubRun,
            Level::Job | Level::InputFile | Level::Event => return,
        };
        self.el
            .schedule(ScheduleId::first())
            .lock()
            .record_output_closure_requests(boundary);
    }

    // ── job ────────────────────────────────────────────────────────

    fn begin_job(&mut self) -> Result<(), Failure> {
        self.timer.start();
        debug!("beginJob");
        let el = Arc::clone(&self.el);
        {
            let mut input = el.input.lock();
            let source = &mut input.source;
            guarded("source", || source.begin_job())?.map_err(|e| {
                error!(category = %e.category(), "source beginJob failed: {e}");
                e.with_context("while processing the beginJob of the 'source'")
            })?;
        }
        ScheduleIteration::new(&el.schedules).for_each_schedule(Schedule::begin_job)?;
        el.outputs.begin_job()?;
        el.activity.post_begin_job.invoke(&());
        Ok(())
    }

    fn end_job(&mut self) -> Result<(), Failure> {
        debug!("endJob");
        let el = Arc::clone(&self.el);
        let mut collector = ExceptionCollector::default();
        if el.outputs.some_outputs_open() {
            collector.collect(self.close_all_output_files());
        }
        for schedule in el.schedules.iter() {
            collector.call("schedule endJob", || schedule.lock().end_job());
        }
        collector.call("source endJob", || {
            let mut input = el.input.lock();
            input.source.end_job().map_err(|e| {
                Failure::from(e.with_context("while processing the endJob of the 'source'"))
            })
        });
        collector.call("output endJob", || Ok(el.outputs.end_job()?));
        collector.call("postEndJob", || {
            el.activity.post_end_job.invoke(&());
            Ok(())
        });
        self.timer.stop();
        self.build_summary();
        collector.into_result()
    }

    fn build_summary(&mut self) {
        let mut summary = JobSummary::default();
        for schedule in self.el.schedules.iter() {
            summary.accumulate(&schedule.lock());
        }
        summary.input_files = self.el.outputs.input_file_number();
        summary.output_files = self.el.outputs.files_opened();
        summary.wall_time = self.timer.elapsed();
        if self.scheduler.want_summary {
            summary.log();
        }
        self.summary = summary;
    }

    // ── input files ────────────────────────────────────────────────

    fn open_input_file(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        el.activity.pre_open_file.invoke(&());
        let file = {
            let mut input = el.input.lock();
            let source = &mut input.source;
            guarded("source", || source.read_file())??
        };
        let file = file.ok_or_else(|| {
            ProcessingError::logic("the input source announced a file but returned none")
        })?;
        debug!(%file, "opened input file");
        el.activity.post_open_file.invoke(&file);
        el.outputs.respond_to_open_input_file(file);
        Ok(())
    }

    fn close_input_file(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        el.outputs.increment_input_file_number();
        el.outputs.record_output_closure_requests(Granularity::InputFile);
        if el.outputs.outputs_to_close() {
            self.close_some_output_files()?;
        }
        el.activity.pre_close_file.invoke(&());
        {
            let mut input = el.input.lock();
            let source = &mut input.source;
            guarded("source", || source.close_file())??;
        }
        el.activity.post_close_file.invoke(&());
        debug!(files = el.outputs.input_file_number(), "closed input file");
        Ok(())
    }

    fn close_all_files(&mut self) -> Result<(), Failure> {
        self.close_all_output_files()?;
        self.close_input_file()
    }

    // ── output files ───────────────────────────────────────────────

    fn set_main_file_status(&self, status: OutputFileStatus) {
        self.el
            .schedule(ScheduleId::first())
            .lock()
            .set_output_file_status(status);
    }

    fn main_file_status(&self) -> OutputFileStatus {
        self.el.schedule(ScheduleId::first()).lock().file_status()
    }

    fn open_some_output_files(&self) -> Result<(), Failure> {
        if !self.el.outputs.outputs_to_open() {
            return Ok(());
        }
        for label in self.el.outputs.open_some_output_files()? {
            debug!(output = %label, "opened output file");
            self.el.activity.post_open_output_file.invoke(&label);
        }
        Ok(())
    }

    fn close_some_output_files(&mut self) -> Result<(), Failure> {
        let closed = self
            .el
            .schedule(ScheduleId::first())
            .lock()
            .close_some_output_files()?;
        ScheduleIteration::new(&self.el.schedules).for_each_schedule(|s| {
            s.rebase_range_set_handlers();
            Ok(())
        })?;
        for label in closed {
            info!(output = %label, "closed output file");
            self.el.activity.post_close_output_file.invoke(&label);
        }
        Ok(())
    }

    fn close_all_output_files(&mut self) -> Result<(), Failure> {
        for label in self.el.outputs.close_all_output_files()? {
            info!(output = %label, "closed output file");
            self.el.activity.post_close_output_file.invoke(&label);
        }
        Ok(())
    }

    // ── runs ───────────────────────────────────────────────────────

    fn read_run(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let mut input = el.input.lock();
        el.activity.pre_source_run.invoke(&());
        let InputCursor {
            source,
            run,
            subrun,
            ..
        } = &mut *input;
        let mut principal = guarded("source", || source.read_run())??;
        principal.create_groups_for_produced_products(&el.products);
        el.activity.post_source_run.invoke(&principal);
        principal.enable_lookup_of_produced_products();
        let rsh = source.run_range_set_handler();
        debug!(run = %principal.id(), handler = ?rsh.kind(), "readRun");
        ScheduleIteration::new(&el.schedules).for_each_schedule(|s| {
            s.seed_run_range_set(rsh.clone());
            Ok(())
        })?;
        *run = Some(principal);
        *subrun = None;
        Ok(())
    }

    fn begin_run_if_not_done(&mut self) -> Result<(), Failure> {
        if self.begin_run_called {
            return Ok(());
        }
        self.begin_run()
    }

    fn begin_run(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let mut input = el.input.lock();
        let run = input
            .run
            .as_mut()
            .ok_or_else(|| ProcessingError::logic("beginRun requested with no active run"))?;
        if run.is_flush() {
            return Ok(());
        }
        self.finalize_run_enabled = true;
        debug!(run = %run.id(), "beginRun");
        el.activity.pre_begin_run.invoke(run);
        ScheduleIteration::new(&el.schedules)
            .for_each_schedule(|s| s.process_run(Transition::BeginRun, run))
            .map_err(processing_failure)?;
        el.activity.post_begin_run.invoke(run);
        self.begin_run_called = true;
        Ok(())
    }

    fn end_run(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let mut input = el.input.lock();
        let run = input
            .run
            .as_mut()
            .ok_or_else(|| ProcessingError::logic("endRun requested with no active run"))?;
        if run.is_flush() {
            return Ok(());
        }
        debug!(run = %run.id(), "endRun");
        el.activity.pre_end_run.invoke(&run.id());
        ScheduleIteration::new(&el.schedules)
            .for_each_schedule(|s| s.process_run(Transition::EndRun, run))
            .map_err(processing_failure)?;
        el.activity.post_end_run.invoke(run);
        self.begin_run_called = false;
        Ok(())
    }

    fn finalize_run(&mut self) -> Result<(), Failure> {
        if !self.finalize_run_enabled {
            return Ok(());
        }
        let flush = self
            .el
            .input
            .lock()
            .run
            .as_ref()
            .map_or(true, |run| run.is_flush());
        if flush {
            return Ok(());
        }
        self.open_some_output_files()?;
        self.set_run_aux_range_set_id()?;
        if self.begin_run_called {
            self.end_run()?;
        }
        self.write_run()?;
        self.finalize_run_enabled = false;
        Ok(())
    }

    fn write_run(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let input = el.input.lock();
        let run = input
            .run
            .as_ref()
            .ok_or_else(|| ProcessingError::logic("writeRun requested with no active run"))?;
        debug!(run = %run.id(), ranges = %run.seen_ranges(), "writeRun");
        el.schedule(ScheduleId::first()).lock().write_run(run)?;
        Ok(())
    }

    fn set_run_aux_range_set_id(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let switching = self.main_file_status() == OutputFileStatus::Switching;
        let mut input = el.input.lock();
        let run = input
            .run
            .as_mut()
            .ok_or_else(|| ProcessingError::logic("no active run to stamp ranges on"))?;
        let schedules = ScheduleIteration::new(&el.schedules);
        let kind = el
            .schedule(ScheduleId::first())
            .lock()
            .run_range_set_handler()?
            .kind();
        let seen = match kind {
            HandlerKind::Open => merged_seen_ranges(&schedules, Schedule::run_range_set_handler)?,
            HandlerKind::Closed => {
                let idx = schedules.index_of_latest_event(Schedule::run_range_set_handler)?;
                let mut at_switch = el.schedules[idx].lock().run_range_set_handler()?.clone();
                if !switching {
                    at_switch.flush_ranges();
                }
                seed_all(&schedules, &at_switch, Schedule::seed_run_range_set)?;
                at_switch.seen_ranges()
            }
        };
        run.update_seen_ranges(seen.clone());
        schedules.for_each_schedule(|s| {
            s.set_run_aux_range_set(seen.clone());
            Ok(())
        })
    }

    // ── sub-runs ───────────────────────────────────────────────────

    fn read_subrun(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let mut input = el.input.lock();
        let InputCursor {
            source,
            run,
            subrun,
            ..
        } = &mut *input;
        let run = run.as_ref().ok_or_else(|| {
            ProcessingError::logic("a run must be active before a subrun is read")
        })?;
        el.activity.pre_source_subrun.invoke(&());
        let mut principal = guarded("source", || source.read_subrun(run))??;
        principal.create_groups_for_produced_products(&el.products);
        el.activity.post_source_subrun.invoke(&principal);
        principal.enable_lookup_of_produced_products();
        let rsh = source.subrun_range_set_handler();
        debug!(subrun = %principal.id(), handler = ?rsh.kind(), "readSubRun");
        ScheduleIteration::new(&el.schedules).for_each_schedule(|s| {
            s.seed_subrun_range_set(rsh.clone());
            Ok(())
        })?;
        *subrun = Some(principal);
        Ok(())
    }

    fn begin_subrun_if_not_done(&mut self) -> Result<(), Failure> {
        if self.begin_subrun_called {
            return Ok(());
        }
        self.begin_subrun()
    }

    fn begin_subrun(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let mut input = el.input.lock();
        let subrun = input.subrun.as_mut().ok_or_else(|| {
            ProcessingError::logic("beginSubRun requested with no active subrun")
        })?;
        if subrun.is_flush() {
            return Ok(());
        }
        self.finalize_subrun_enabled = true;
        debug!(subrun = %subrun.id(), "beginSubRun");
        el.activity.pre_begin_subrun.invoke(subrun);
        ScheduleIteration::new(&el.schedules)
            .for_each_schedule(|s| s.process_subrun(Transition::BeginSubRun, subrun))
            .map_err(processing_failure)?;
        el.activity.post_begin_subrun.invoke(subrun);
        self.begin_subrun_called = true;
        Ok(())
    }

    fn end_subrun(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let mut input = el.input.lock();
        let subrun = input.subrun.as_mut().ok_or_else(|| {
            ProcessingError::logic("endSubRun requested with no active subrun")
        })?;
        if subrun.is_flush() {
            return Ok(());
        }
        debug!(subrun = %subrun.id(), "endSubRun");
        el.activity.pre_end_subrun.invoke(&subrun.id());
        ScheduleIteration::new(&el.schedules)
            .for_each_schedule(|s| s.process_subrun(Transition::EndSubRun, subrun))
            .map_err(processing_failure)?;
        el.activity.post_end_subrun.invoke(subrun);
        self.begin_subrun_called = false;
        Ok(())
    }

    fn finalize_subrun(&mut self) -> Result<(), Failure> {
        if !self.finalize_subrun_enabled {
            return Ok(());
        }
        let flush = self
            .el
            .input
            .lock()
            .subrun
            .as_ref()
            .map_or(true, |subrun| subrun.is_flush());
        if flush {
            return Ok(());
        }
        self.open_some_output_files()?;
        self.set_subrun_aux_range_set_id()?;
        if self.begin_subrun_called {
            self.end_subrun()?;
        }
        self.write_subrun()?;
        self.finalize_subrun_enabled = false;
        Ok(())
    }

    fn write_subrun(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let input = el.input.lock();
        let subrun = input.subrun.as_ref().ok_or_else(|| {
            ProcessingError::logic("writeSubRun requested with no active subrun")
        })?;
        debug!(subrun = %subrun.id(), ranges = %subrun.seen_ranges(), "writeSubRun");
        el.schedule(ScheduleId::first()).lock().write_subrun(subrun)?;
        Ok(())
    }

    fn set_subrun_aux_range_set_id(&mut self) -> Result<(), Failure> {
        let el = Arc::clone(&self.el);
        let switching = self.main_file_status() == OutputFileStatus::Switching;
        let mut input = el.input.lock();
        let subrun = input
            .subrun
            .as_mut()
            .ok_or_else(|| ProcessingError::logic("no active subrun to stamp ranges on"))?;
        let schedules = ScheduleIteration::new(&el.schedules);
        let kind = el
            .schedule(ScheduleId::first())
            .lock()
            .subrun_range_set_handler()?
            .kind();
        let seen = match kind {
            HandlerKind::Open => {
                merged_seen_ranges(&schedules, Schedule::subrun_range_set_handler)?
            }
            HandlerKind::Closed => {
                let idx = schedules.index_of_latest_event(Schedule::subrun_range_set_handler)?;
                let (mut at_switch, mut run_at_switch) = {
                    let latest = el.schedules[idx].lock();
                    (
                        latest.subrun_range_set_handler()?.clone(),
                        latest.run_range_set_handler()?.clone(),
                    )
                };
                if switching {
                    at_switch.maybe_split_range();
                    run_at_switch.maybe_split_range();
                    seed_all(&schedules, &run_at_switch, Schedule::seed_run_range_set)?;
                } else {
                    at_switch.flush_ranges();
                }
                seed_all(&schedules, &at_switch, Schedule::seed_subrun_range_set)?;
                at_switch.seen_ranges()
            }
        };
        subrun.update_seen_ranges(seen.clone());
        schedules.for_each_schedule(|s| {
            s.set_subrun_aux_range_set(seen.clone());
            Ok(())
        })
    }

    // ── events ─────────────────────────────────────────────────────

    /// Pump events on every schedule until the source leaves the event
    /// level, carrying out output-file switches between bursts.
    fn process_events(&mut self) -> Result<(), Failure> {
        if self.should_stop() {
            return Ok(());
        }
        let el = Arc::clone(&self.el);
        el.first_event.store(true, Ordering::Release);
        loop {
            self.begin_run_if_not_done()?;
            self.begin_subrun_if_not_done()?;

            let lanes = el.schedules.len();
            let burst = self.tasks.run_and_wait(|spawner| {
                for i in 0..lanes.saturating_sub(1) {
                    let el = Arc::clone(&el);
                    spawner.spawn(move |s| pump::read_and_process(el, ScheduleId(i), s));
                }
                pump::read_and_process(Arc::clone(&el), ScheduleId(lanes - 1), spawner);
            });
            if let Err(panic) = burst {
                el.exceptions.store(Failure::Unknown(panic.0));
            }
            el.exceptions.throw_if_stored()?;

            if !el.file_switch_in_progress.load(Ordering::Acquire) {
                break;
            }
            info!("switching output files between events");
            self.set_main_file_status(OutputFileStatus::Switching);
            self.finalize_containing_levels(Level::Event)?;
            if el.outputs.outputs_to_close() {
                self.close_some_output_files()?;
            }
            el.first_event.store(true, Ordering::Release);
            el.file_switch_in_progress.store(false, Ordering::Release);
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("schedules", &self.el.schedules.len())
            .field("threads", &self.tasks.num_threads())
            .field("scheduler", &self.scheduler)
            .field("outputs", &self.el.outputs)
            .finish_non_exhaustive()
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn processing_failure(failure: Failure) -> Failure {
    match failure {
        Failure::Processing(e) => Failure::Processing(ProcessingError::wrap(
            ErrorCategory::EventProcessorFailure,
            "an exception occurred during current event processing",
            e,
        )),
        unknown @ Failure::Unknown(_) => unknown,
    }
}

fn merged_seen_ranges(
    schedules: &ScheduleIteration<'_>,
    handler: impl Fn(&Schedule) -> Result<&RangeSetHandler, Failure>,
) -> Result<RangeSet, Failure> {
    schedules.try_fold(RangeSet::invalid(), |mut merged, schedule| {
        merged
            .merge(&handler(schedule)?.seen_ranges())
            .map_err(ProcessingError::from)?;
        Ok(merged)
    })
}

fn seed_all(
    schedules: &ScheduleIteration<'_>,
    rsh: &RangeSetHandler,
    seed: impl Fn(&mut Schedule, RangeSetHandler),
) -> Result<(), Failure> {
    schedules.for_each_schedule(|s| {
        seed(s, rsh.clone());
        Ok(())
    })
}

fn validate_layout(schedules: &[Schedule]) -> Result<(), ConfigError> {
    let Some((primary, rest)) = schedules.split_first() else {
        return Ok(());
    };
    let mut names = IndexSet::new();
    for name in primary.path_names() {
        if !names.insert(name) {
            return Err(ConfigError::DuplicatePath {
                name: name.to_string(),
            });
        }
    }
    let layout = primary.layout();
    for schedule in rest {
        if schedule.path_names() != primary.path_names() || schedule.layout() != layout {
            return Err(ConfigError::InconsistentPaths {
                schedule: schedule.id(),
            });
        }
    }
    Ok(())
}

fn product_tables(primary: &Schedule) -> Result<ProductTables, ConfigError> {
    let mut tables = ProductTables::new();
    for description in primary.produced_products() {
        let product = description.key.to_string();
        if !tables.insert(description) {
            return Err(ConfigError::DuplicateProduct { product });
        }
    }
    Ok(tables)
}
