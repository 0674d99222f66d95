use std::sync::Arc;

use parking_lot::Mutex;
use quark_core::{
    ErrorCategory, EventId, EventPrincipal, FileBlock, OutputModule, ProcessingError, RangeError,
    RangeSet, RunId, RunPrincipal, SubRunId, SubRunPrincipal,
};

/// Everything written to one output file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordedFile {
    /// Input file current when the output file was opened.
    pub input_file: String,
    pub events: Vec<EventId>,
    pub subruns: Vec<(SubRunId, RangeSet)>,
    pub runs: Vec<(RunId, RangeSet)>,
    pub closed: bool,
}

/// Shared view of what a [`RecordingOutput`] wrote.
#[derive(Clone, Debug, Default)]
pub struct OutputLog(Arc<Mutex<Vec<RecordedFile>>>);

impl OutputLog {
    /// Snapshot of every file opened so far.
    pub fn files(&self) -> Vec<RecordedFile> {
        self.0.lock().clone()
    }

    pub fn file_count(&self) -> usize {
        self.0.lock().len()
    }

    /// Every event written, in write order across files.
    pub fn all_events(&self) -> Vec<EventId> {
        self.0
            .lock()
            .iter()
            .flat_map(|f| f.events.iter().copied())
            .collect()
    }

    /// Union of the run fragments written for `run` across all files.
    pub fn merged_run_ranges(&self, run: RunId) -> Result<RangeSet, RangeError> {
        let files = self.0.lock();
        let mut merged = RangeSet::invalid();
        for (_, ranges) in files.iter().flat_map(|f| &f.runs).filter(|(id, _)| *id == run) {
            merged.merge(ranges)?;
        }
        Ok(merged)
    }

    /// Union of the sub-run fragments written for `subrun` across all files.
    pub fn merged_subrun_ranges(&self, subrun: SubRunId) -> Result<RangeSet, RangeError> {
        let files = self.0.lock();
        let mut merged = RangeSet::invalid();
        for (_, ranges) in files
            .iter()
            .flat_map(|f| &f.subruns)
            .filter(|(id, _)| *id == subrun)
        {
            merged.merge(ranges)?;
        }
        Ok(merged)
    }

    fn with_open<T>(
        &self,
        what: &str,
        f: impl FnOnce(&mut RecordedFile) -> T,
    ) -> Result<T, ProcessingError> {
        let mut files = self.0.lock();
        match files.last_mut() {
            Some(file) if !file.closed => Ok(f(file)),
            _ => Err(ProcessingError::new(
                ErrorCategory::FileWriteError,
                format!("{what} with no output file open"),
            )),
        }
    }
}

/// Output module that records every call into an [`OutputLog`].
#[derive(Debug)]
pub struct RecordingOutput {
    label: String,
    log: OutputLog,
}

impl RecordingOutput {
    /// A new module and the log it writes into.
    pub fn new(label: impl Into<String>) -> (Self, OutputLog) {
        let log = OutputLog::default();
        (
            Self {
                label: label.into(),
                log: log.clone(),
            },
            log,
        )
    }
}

impl OutputModule for RecordingOutput {
    fn label(&self) -> &str {
        &self.label
    }

    fn open_file(&mut self, input: &FileBlock) -> Result<(), ProcessingError> {
        let mut files = self.log.0.lock();
        if files.last().is_some_and(|f| !f.closed) {
            return Err(ProcessingError::new(
                ErrorCategory::FileOpenError,
                format!("{}: file already open", self.label),
            ));
        }
        files.push(RecordedFile {
            input_file: input.file_name().to_owned(),
            ..RecordedFile::default()
        });
        Ok(())
    }

    fn close_file(&mut self) -> Result<(), ProcessingError> {
        self.log.with_open("close", |f| f.closed = true)
    }

    fn write_event(&mut self, event: &EventPrincipal) -> Result<(), ProcessingError> {
        let id = event.id();
        self.log.with_open("event write", |f| f.events.push(id))
    }

    fn write_subrun(&mut self, subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        let entry = (subrun.id(), subrun.seen_ranges().clone());
        self.log.with_open("sub-run write", |f| f.subruns.push(entry))
    }

    fn write_run(&mut self, run: &RunPrincipal) -> Result<(), ProcessingError> {
        let entry = (run.id(), run.seen_ranges().clone());
        self.log.with_open("run write", |f| f.runs.push(entry))
    }
}
