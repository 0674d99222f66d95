//! Lifecycle hooks.
//!
//! Services register callbacks on the [`ActivityRegistry`] before the job
//! starts; the event processor invokes them in registration order at the
//! matching points of the level machine and the event pump. Event hooks
//! run on lane threads, so every callback must be `Send + Sync`.

use std::fmt;

use quark_core::{
    EventPrincipal, FileBlock, RunId, RunPrincipal, ScheduleId, SubRunId, SubRunPrincipal,
};

type Callback<A> = Box<dyn Fn(&A) + Send + Sync>;

/// An ordered list of callbacks taking `&A`.
pub struct Signal<A: ?Sized> {
    slots: Vec<Callback<A>>,
}

impl<A: ?Sized> Default for Signal<A> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<A: ?Sized> Signal<A> {
    /// Append a callback.
    pub fn watch(&mut self, f: impl Fn(&A) + Send + Sync + 'static) {
        self.slots.push(Box::new(f));
    }

    /// Invoke every callback in registration order.
    pub fn invoke(&self, arg: &A) {
        for slot in &self.slots {
            slot(arg);
        }
    }

    /// Number of callbacks.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<A: ?Sized> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("slots", &self.slots.len()).finish()
    }
}

/// Every lifecycle hook the event processor fires.
#[derive(Debug, Default)]
pub struct ActivityRegistry {
    /// After every schedule and the source ran `begin_job`.
    pub post_begin_job: Signal<()>,
    /// After every schedule and the source ran `end_job`.
    pub post_end_job: Signal<()>,
    /// Before an input file is opened.
    pub pre_open_file: Signal<()>,
    /// After an input file was opened.
    pub post_open_file: Signal<FileBlock>,
    /// Before the input file is closed.
    pub pre_close_file: Signal<()>,
    /// After the input file was closed.
    pub post_close_file: Signal<()>,
    /// Before the source reads a run.
    pub pre_source_run: Signal<()>,
    /// After a run was read.
    pub post_source_run: Signal<RunPrincipal>,
    /// Before the source reads a sub-run.
    pub pre_source_subrun: Signal<()>,
    /// After a sub-run was read.
    pub post_source_subrun: Signal<SubRunPrincipal>,
    /// Before a lane reads an event.
    pub pre_source_event: Signal<ScheduleId>,
    /// After an event was read, before product lookup is enabled.
    pub post_read_event: Signal<EventPrincipal>,
    /// After an event was read and made available.
    pub post_source_event: Signal<EventPrincipal>,
    /// Before modules see the start of a run.
    pub pre_begin_run: Signal<RunPrincipal>,
    /// After modules saw the start of a run.
    pub post_begin_run: Signal<RunPrincipal>,
    /// Before modules see the end of a run.
    pub pre_end_run: Signal<RunId>,
    /// After modules saw the end of a run.
    pub post_end_run: Signal<RunPrincipal>,
    /// Before modules see the start of a sub-run.
    pub pre_begin_subrun: Signal<SubRunPrincipal>,
    /// After modules saw the start of a sub-run.
    pub post_begin_subrun: Signal<SubRunPrincipal>,
    /// Before modules see the end of a sub-run.
    pub pre_end_subrun: Signal<SubRunId>,
    /// After modules saw the end of a sub-run.
    pub post_end_subrun: Signal<SubRunPrincipal>,
    /// After an event finished its write stage.
    pub post_process_event: Signal<EventPrincipal>,
    /// After an output module opened a file; receives the module label.
    pub post_open_output_file: Signal<str>,
    /// After an output module closed a file; receives the module label.
    pub post_close_output_file: Signal<str>,
    /// When the job ends with a failure.
    pub on_abnormal_termination: Signal<()>,
}

impl ActivityRegistry {
    /// Registry with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }
}

const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ActivityRegistry>();
};
