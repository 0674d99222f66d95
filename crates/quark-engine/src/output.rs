//! Output modules shared by every schedule.
//!
//! The [`OutputHub`] owns all output modules behind one lock together with
//! the bookkeeping that decides when their files close: per-file counters,
//! [`FileClosingCriteria`], and the sets of outputs waiting to close or to
//! reopen. Files are opened lazily, when the first record needs writing.

use std::fmt;
use std::time::{Duration, Instant};

use indexmap::IndexSet;
use parking_lot::Mutex;
use quark_core::{
    EventPrincipal, FileBlock, Granularity, OutputModule, ProcessingError, RunPrincipal,
    SubRunPrincipal,
};
use tracing::debug;

use crate::config::OutputSpec;

// ── FileClosingCriteria ────────────────────────────────────────────

/// When an output module should close its current file.
///
/// All limits default to `None` (never). A file is due for closing as soon
/// as any configured limit is reached, but only at a boundary at least as
/// coarse as the [`granularity`](Self::granularity).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileClosingCriteria {
    /// Close after this many events.
    pub max_events: Option<u64>,
    /// Close after this many sub-runs.
    pub max_subruns: Option<u64>,
    /// Close after this many runs.
    pub max_runs: Option<u64>,
    /// Close after this many input files.
    pub max_input_files: Option<u64>,
    /// Close once the file has been open this long.
    pub max_age: Option<Duration>,
    /// Explicit boundary granularity. `None` derives it from the limits.
    pub granularity: Option<Granularity>,
}

impl FileClosingCriteria {
    /// Close after `n` events.
    pub fn events(n: u64) -> Self {
        Self {
            max_events: Some(n),
            ..Self::default()
        }
    }

    /// Close after `n` sub-runs.
    pub fn subruns(n: u64) -> Self {
        Self {
            max_subruns: Some(n),
            ..Self::default()
        }
    }

    /// Close after `n` input files.
    pub fn input_files(n: u64) -> Self {
        Self {
            max_input_files: Some(n),
            ..Self::default()
        }
    }

    /// Boundary granularity: the explicit one, else the finest level any
    /// configured limit counts, else `Job`.
    pub fn granularity(&self) -> Granularity {
        if let Some(g) = self.granularity {
            return g;
        }
        if self.max_events.is_some() || self.max_age.is_some() {
            Granularity::Event
        } else if self.max_subruns.is_some() {
            Granularity::SubRun
        } else if self.max_runs.is_some() {
            Granularity::Run
        } else if self.max_input_files.is_some() {
            Granularity::InputFile
        } else {
            Granularity::Job
        }
    }

    fn should_close(&self, counters: &FileCounters) -> bool {
        let reached = |limit: Option<u64>, count: u64| limit.is_some_and(|max| count >= max);
        reached(self.max_events, counters.events)
            || reached(self.max_subruns, counters.subruns)
            || reached(self.max_runs, counters.runs)
            || reached(self.max_input_files, counters.input_files)
            || self
                .max_age
                .is_some_and(|age| counters.opened_at.elapsed() >= age)
    }
}

// ── Status ─────────────────────────────────────────────────────────

/// Output-file state of the job as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFileStatus {
    /// Normal processing.
    Open,
    /// An output-file switch is being carried out.
    Switching,
}

impl fmt::Display for OutputFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Switching => write!(f, "Switching"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct FileCounters {
    events: u64,
    subruns: u64,
    runs: u64,
    input_files: u64,
    opened_at: Instant,
}

impl FileCounters {
    fn new() -> Self {
        Self {
            events: 0,
            subruns: 0,
            runs: 0,
            input_files: 0,
            opened_at: Instant::now(),
        }
    }
}

struct OutputWorker {
    module: Box<dyn OutputModule>,
    criteria: FileClosingCriteria,
    file_open: bool,
    counters: FileCounters,
    files_opened: u64,
}

impl OutputWorker {
    fn label(&self) -> &str {
        self.module.label()
    }
}

struct OutputSet {
    workers: Vec<OutputWorker>,
    to_open: IndexSet<usize>,
    to_close: IndexSet<usize>,
    input_file: Option<FileBlock>,
    input_file_number: u64,
}

impl OutputSet {
    fn open_workers(&mut self) -> impl Iterator<Item = &mut OutputWorker> {
        self.workers.iter_mut().filter(|w| w.file_open)
    }
}

// ── OutputHub ──────────────────────────────────────────────────────

/// All output modules of the job and their file bookkeeping.
pub struct OutputHub {
    inner: Mutex<OutputSet>,
}

impl OutputHub {
    /// Hub over `outputs`. Every output starts waiting to open.
    pub fn new(outputs: Vec<OutputSpec>) -> Self {
        let workers: Vec<OutputWorker> = outputs
            .into_iter()
            .map(|spec| OutputWorker {
                module: spec.module,
                criteria: spec.criteria,
                file_open: false,
                counters: FileCounters::new(),
                files_opened: 0,
            })
            .collect();
        let to_open = (0..workers.len()).collect();
        Self {
            inner: Mutex::new(OutputSet {
                workers,
                to_open,
                to_close: IndexSet::new(),
                input_file: None,
                input_file_number: 0,
            }),
        }
    }

    /// Number of output modules.
    pub fn len(&self) -> usize {
        self.inner.lock().workers.len()
    }

    /// Whether there are no output modules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels of all output modules.
    pub fn labels(&self) -> Vec<String> {
        self.inner
            .lock()
            .workers
            .iter()
            .map(|w| w.label().to_string())
            .collect()
    }

    /// Number of input files closed so far.
    pub fn input_file_number(&self) -> u64 {
        self.inner.lock().input_file_number
    }

    /// Total number of output files opened so far.
    pub fn files_opened(&self) -> u64 {
        self.inner.lock().workers.iter().map(|w| w.files_opened).sum()
    }

    /// Whether any output is waiting to close its file.
    pub fn outputs_to_close(&self) -> bool {
        !self.inner.lock().to_close.is_empty()
    }

    /// Whether any output is waiting to open a file.
    pub fn outputs_to_open(&self) -> bool {
        !self.inner.lock().to_open.is_empty()
    }

    /// Whether any output has a file open.
    pub fn some_outputs_open(&self) -> bool {
        self.inner.lock().workers.iter().any(|w| w.file_open)
    }

    pub(crate) fn begin_job(&self) -> Result<(), ProcessingError> {
        let mut set = self.inner.lock();
        for worker in &mut set.workers {
            worker.module.begin_job()?;
        }
        Ok(())
    }

    pub(crate) fn end_job(&self) -> Result<(), ProcessingError> {
        let mut set = self.inner.lock();
        for worker in &mut set.workers {
            worker.module.end_job()?;
        }
        Ok(())
    }

    /// Remember the input file new output files are opened against.
    pub(crate) fn respond_to_open_input_file(&self, file: FileBlock) {
        self.inner.lock().input_file = Some(file);
    }

    /// Count one more input file against every open output file.
    pub(crate) fn increment_input_file_number(&self) {
        let mut set = self.inner.lock();
        set.input_file_number += 1;
        for worker in set.open_workers() {
            worker.counters.input_files += 1;
        }
    }

    /// Mark every output whose closing criteria are met at `boundary`.
    pub(crate) fn record_output_closure_requests(&self, boundary: Granularity) {
        let mut set = self.inner.lock();
        let due: Vec<usize> = set
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.file_open && boundary >= w.criteria.granularity())
            .filter(|(_, w)| w.criteria.should_close(&w.counters))
            .map(|(i, _)| i)
            .collect();
        for idx in due {
            if set.to_close.insert(idx) {
                debug!(output = set.workers[idx].label(), %boundary, "output file closure requested");
            }
        }
    }

    /// Open files for every output waiting to open. Returns their labels.
    pub(crate) fn open_some_output_files(&self) -> Result<Vec<String>, ProcessingError> {
        let mut set = self.inner.lock();
        if set.to_open.is_empty() {
            return Ok(Vec::new());
        }
        let input = set.input_file.clone().ok_or_else(|| {
            ProcessingError::logic("cannot open output files before an input file is open")
        })?;
        let pending: Vec<usize> = set.to_open.iter().copied().collect();
        let mut opened = Vec::with_capacity(pending.len());
        for idx in pending {
            let worker = &mut set.workers[idx];
            worker.module.open_file(&input)?;
            worker.file_open = true;
            worker.counters = FileCounters::new();
            worker.files_opened += 1;
            opened.push(worker.label().to_string());
            set.to_open.shift_remove(&idx);
        }
        Ok(opened)
    }

    /// Close the files of every output waiting to close; they then wait to
    /// reopen. Returns their labels.
    pub(crate) fn close_some_output_files(&self) -> Result<Vec<String>, ProcessingError> {
        let mut set = self.inner.lock();
        let pending: Vec<usize> = set.to_close.iter().copied().collect();
        let mut closed = Vec::with_capacity(pending.len());
        for idx in pending {
            let worker = &mut set.workers[idx];
            if !worker.file_open {
                return Err(ProcessingError::logic(format!(
                    "output '{}' asked to close a file that is not open",
                    worker.label()
                )));
            }
            worker.module.close_file()?;
            worker.file_open = false;
            closed.push(worker.label().to_string());
            set.to_close.shift_remove(&idx);
            set.to_open.insert(idx);
        }
        Ok(closed)
    }

    /// Close every open output file. Returns their labels.
    pub(crate) fn close_all_output_files(&self) -> Result<Vec<String>, ProcessingError> {
        let mut set = self.inner.lock();
        set.to_close.clear();
        let mut closed = Vec::new();
        for (idx, worker) in set.workers.iter_mut().enumerate() {
            if !worker.file_open {
                continue;
            }
            worker.module.close_file()?;
            worker.file_open = false;
            closed.push((idx, worker.label().to_string()));
        }
        let mut labels = Vec::with_capacity(closed.len());
        for (idx, label) in closed {
            set.to_open.insert(idx);
            labels.push(label);
        }
        Ok(labels)
    }

    pub(crate) fn write_event(&self, event: &EventPrincipal) -> Result<(), ProcessingError> {
        let mut set = self.inner.lock();
        for worker in set.open_workers() {
            worker.module.write_event(event)?;
            worker.counters.events += 1;
        }
        Ok(())
    }

    pub(crate) fn write_subrun(&self, subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        let mut set = self.inner.lock();
        for worker in set.open_workers() {
            worker.module.write_subrun(subrun)?;
            worker.counters.subruns += 1;
        }
        Ok(())
    }

    pub(crate) fn write_run(&self, run: &RunPrincipal) -> Result<(), ProcessingError> {
        let mut set = self.inner.lock();
        for worker in set.open_workers() {
            worker.module.write_run(run)?;
            worker.counters.runs += 1;
        }
        Ok(())
    }
}

impl fmt::Debug for OutputHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHub")
            .field("outputs", &self.labels())
            .finish()
    }
}
