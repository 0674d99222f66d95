//! The per-schedule event pump.
//!
//! Each lane runs a chain of tasks on the [`TaskGroup`](crate::TaskGroup):
//! read one event under the input lock, run the trigger paths, run the
//! observers, write, then submit the next read. A lane never starts its
//! next read before the previous event's chain has finished, but different
//! lanes overlap freely. Only the read holds the input lock.
//!
//! Lock order: input, then a schedule, then the output hub. The finish
//! stage takes its schedule, then the finish lock, then the hub.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use quark_core::{
    ActionTable, ErrorAction, ErrorCategory, Failure, Granularity, InputSource, ItemType, Level,
    ProcessingError, ProductTables, RunPrincipal, ScheduleId, SubRunPrincipal,
};
use tracing::{debug, debug_span, error, info, trace, warn};

use crate::activity::ActivityRegistry;
use crate::exception::{guarded, SharedException};
use crate::output::OutputHub;
use crate::schedule::Schedule;
use crate::shutdown::ShutdownFlag;
use crate::task::TaskSpawner;

/// The input source with the records it delivered last.
pub(crate) struct InputCursor {
    pub(crate) source: Box<dyn InputSource>,
    /// Resolved next level; `None` means it must be asked of the source.
    pub(crate) next_level: Option<Level>,
    pub(crate) run: Option<RunPrincipal>,
    pub(crate) subrun: Option<SubRunPrincipal>,
}

impl InputCursor {
    pub(crate) fn new(source: Box<dyn InputSource>) -> Self {
        Self {
            source,
            next_level: None,
            run: None,
            subrun: None,
        }
    }

    /// The next level, querying the source if it is not yet known.
    pub(crate) fn next_level(&mut self) -> Result<Level, Failure> {
        if let Some(level) = self.next_level {
            return Ok(level);
        }
        let source = &mut self.source;
        let item = guarded("source", || source.next_item_type())??;
        let level = match item {
            ItemType::Stop => Level::Job,
            ItemType::File => Level::InputFile,
            ItemType::Run => Level::Run,
            ItemType::SubRun => Level::SubRun,
            ItemType::Event => Level::Event,
            ItemType::Invalid => {
                return Err(ProcessingError::logic(
                    "Invalid next item type presented to the event processor.",
                )
                .into())
            }
        };
        trace!(%item, next = %level, "advanced item type");
        self.next_level = Some(level);
        Ok(level)
    }
}

/// State shared between the driver and every lane.
pub(crate) struct EventLoop {
    pub(crate) input: Mutex<InputCursor>,
    pub(crate) schedules: Box<[Mutex<Schedule>]>,
    pub(crate) outputs: Arc<OutputHub>,
    pub(crate) activity: ActivityRegistry,
    pub(crate) actions: ActionTable,
    pub(crate) products: ProductTables,
    pub(crate) exceptions: SharedException,
    pub(crate) shutdown: ShutdownFlag,
    pub(crate) file_switch_in_progress: AtomicBool,
    pub(crate) first_event: AtomicBool,
    finish_lock: Mutex<()>,
}

enum ReadOutcome {
    Stop,
    Read { flush: bool },
}

enum Flow {
    Continue,
    SkipEvent,
    Terminate,
}

impl EventLoop {
    pub(crate) fn new(
        source: Box<dyn InputSource>,
        schedules: Vec<Schedule>,
        outputs: Arc<OutputHub>,
        activity: ActivityRegistry,
        actions: ActionTable,
        products: ProductTables,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            input: Mutex::new(InputCursor::new(source)),
            schedules: schedules.into_iter().map(Mutex::new).collect(),
            outputs,
            activity,
            actions,
            products,
            exceptions: SharedException::new(),
            shutdown,
            file_switch_in_progress: AtomicBool::new(false),
            first_event: AtomicBool::new(false),
            finish_lock: Mutex::new(()),
        }
    }

    pub(crate) fn schedule(&self, sid: ScheduleId) -> &Mutex<Schedule> {
        &self.schedules[sid.index()]
    }

    /// Read the next event for `sid` under the input lock.
    fn read_next_event(&self, sid: ScheduleId) -> Result<ReadOutcome, Failure> {
        let mut input = self.input.lock();
        if self.file_switch_in_progress.load(Ordering::Acquire) {
            return Ok(ReadOutcome::Stop);
        }
        let first = self
            .first_event
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !first {
            let level = input.next_level()?;
            if level != Level::Event {
                trace!(next = %level, "no more events at this level");
                return Ok(ReadOutcome::Stop);
            }
            input.next_level = None;
            if self.outputs.outputs_to_close() {
                info!("output file closure requested, switching files");
                self.file_switch_in_progress.store(true, Ordering::Release);
                return Ok(ReadOutcome::Stop);
            }
        }

        let InputCursor { source, subrun, .. } = &mut *input;
        let subrun = subrun
            .as_ref()
            .ok_or_else(|| ProcessingError::logic("event announced outside of any subrun"))?;
        self.activity.pre_source_event.invoke(&sid);
        let mut event = guarded("source", || source.read_event(subrun))??;
        event.create_groups_for_produced_products(&self.products);
        self.activity.post_read_event.invoke(&event);
        event.enable_lookup_of_produced_products();
        self.activity.post_source_event.invoke(&event);
        debug!(event = %event.id(), "read event");

        let flush = event.is_flush();
        self.schedule(sid).lock().accept_principal(event);
        Ok(ReadOutcome::Read { flush })
    }

    /// Open pending outputs, write the event and record Event-level
    /// closure requests, serialized across lanes.
    ///
    /// The event is released and closure requests are recorded even when
    /// the write fails; the failure is returned for classification.
    fn finish_event(&self, sid: ScheduleId) -> Result<(), Failure> {
        let mut schedule = self.schedule(sid).lock();
        if let Some(event) = schedule.event() {
            self.activity.post_process_event.invoke(event);
        }
        let written = {
            let _finish = self.finish_lock.lock();
            let written = self.open_some_output_files().and_then(|()| schedule.write_event());
            self.outputs.record_output_closure_requests(Granularity::Event);
            written
        };
        schedule.release_event();
        written
    }

    fn open_some_output_files(&self) -> Result<(), Failure> {
        for label in self.outputs.open_some_output_files()? {
            debug!(output = %label, "opened output file");
            self.activity.post_open_output_file.invoke(&label);
        }
        Ok(())
    }

    /// Apply the error-action policy to the outcome of one pump stage.
    fn disposition(&self, sid: ScheduleId, stage: &str, result: Result<(), Failure>) -> Flow {
        let failure = match result {
            Ok(()) => return Flow::Continue,
            Err(failure) => failure,
        };
        match failure {
            Failure::Processing(e) => match self.actions.classify(&e) {
                ErrorAction::IgnoreCompletely => {
                    warn!(stage, category = %e.root_category(), "ignoring failure: {e}");
                    Flow::Continue
                }
                ErrorAction::SkipEvent => {
                    warn!(stage, category = %e.root_category(), "skipping event: {e}");
                    let mut schedule = self.schedule(sid).lock();
                    schedule.skip_event();
                    Flow::SkipEvent
                }
                _ => {
                    error!(stage, category = %e.root_category(), "event processing failed: {e}");
                    self.exceptions.store(Failure::Processing(ProcessingError::wrap(
                        ErrorCategory::EventProcessorFailure,
                        "an exception occurred during current event processing",
                        e,
                    )));
                    Flow::Terminate
                }
            },
            Failure::Unknown(message) => {
                error!(stage, "unknown failure during event processing: {message}");
                self.exceptions.store(Failure::Unknown(message));
                Flow::Terminate
            }
        }
    }
}

// ── Lane tasks ─────────────────────────────────────────────────────

/// One pump iteration for lane `sid`: read an event and start its chain.
pub(crate) fn read_and_process(el: Arc<EventLoop>, sid: ScheduleId, spawner: &TaskSpawner) {
    let span = debug_span!("schedule", sid = sid.index());
    let _enter = span.enter();
    if el.shutdown.is_requested() {
        debug!("shutdown requested, lane stopping");
        return;
    }
    match el.read_next_event(sid) {
        Ok(ReadOutcome::Stop) => {}
        Ok(ReadOutcome::Read { flush: true }) => {
            el.schedule(sid).lock().release_event();
            resubmit(el, sid, spawner);
        }
        Ok(ReadOutcome::Read { flush: false }) => process_event_modifiers(el, sid, spawner),
        Err(failure) => {
            error!(%failure, "failed to read the next event");
            el.exceptions.store(failure);
        }
    }
}

fn resubmit(el: Arc<EventLoop>, sid: ScheduleId, spawner: &TaskSpawner) {
    spawner.spawn(move |s| read_and_process(el, sid, s));
}

fn process_event_modifiers(el: Arc<EventLoop>, sid: ScheduleId, spawner: &TaskSpawner) {
    let result = el.schedule(sid).lock().process_event_modifiers();
    match el.disposition(sid, "trigger paths", result) {
        Flow::Continue => spawner.spawn(move |s| process_event_observers(el, sid, s)),
        Flow::SkipEvent => resubmit(el, sid, spawner),
        Flow::Terminate => {}
    }
}

fn process_event_observers(el: Arc<EventLoop>, sid: ScheduleId, spawner: &TaskSpawner) {
    let span = debug_span!("schedule", sid = sid.index());
    let _enter = span.enter();
    let result = el.schedule(sid).lock().process_event_observers();
    match el.disposition(sid, "end path", result) {
        Flow::Continue => spawner.spawn(move |s| finish_event(el, sid, s)),
        Flow::SkipEvent => resubmit(el, sid, spawner),
        Flow::Terminate => {}
    }
}

fn finish_event(el: Arc<EventLoop>, sid: ScheduleId, spawner: &TaskSpawner) {
    let span = debug_span!("schedule", sid = sid.index());
    let _enter = span.enter();
    let result = el.finish_event(sid);
    match el.disposition(sid, "write", result) {
        Flow::Continue | Flow::SkipEvent => resubmit(el, sid, spawner),
        Flow::Terminate => {}
    }
}
