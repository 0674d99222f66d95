//! Contracts implemented by input sources, modules and output modules.
//!
//! The execution core drives these collaborators but never looks inside
//! them. Every fallible call returns a [`ProcessingError`]; panics are
//! caught by the caller and reported as unknown failures.

use crate::error::ProcessingError;
use crate::item::{FileBlock, ItemType};
use crate::principal::{EventPrincipal, RunPrincipal, SubRunPrincipal};
use crate::product::ProductDescription;
use crate::range_handler::RangeSetHandler;

/// Run and sub-run transitions dispatched to every schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Start of a run.
    BeginRun,
    /// End of a run.
    EndRun,
    /// Start of a sub-run.
    BeginSubRun,
    /// End of a sub-run.
    EndSubRun,
}

/// Delivers the data hierarchy one record at a time.
///
/// [`next_item_type`](Self::next_item_type) announces the kind of the next
/// record; the matching `read_*` call then delivers it. Each announced item
/// is read at most once.
pub trait InputSource: Send {
    /// Label used in diagnostics.
    fn label(&self) -> &str {
        "source"
    }

    /// Called once before any input is read.
    fn begin_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Called once after all input has been processed.
    fn end_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Kind of the next record, [`ItemType::Stop`] when exhausted.
    fn next_item_type(&mut self) -> Result<ItemType, ProcessingError>;

    /// Open the announced input file. `None` means the source could not
    /// produce a file block.
    fn read_file(&mut self) -> Result<Option<FileBlock>, ProcessingError>;

    /// Close the current input file.
    fn close_file(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Read the announced run.
    fn read_run(&mut self) -> Result<RunPrincipal, ProcessingError>;

    /// Read the announced sub-run of `run`.
    fn read_subrun(&mut self, run: &RunPrincipal) -> Result<SubRunPrincipal, ProcessingError>;

    /// Read the announced event of `subrun`.
    fn read_event(&mut self, subrun: &SubRunPrincipal) -> Result<EventPrincipal, ProcessingError>;

    /// Range-set handler for the run just read.
    fn run_range_set_handler(&self) -> RangeSetHandler;

    /// Range-set handler for the sub-run just read.
    fn subrun_range_set_handler(&self) -> RangeSetHandler;
}

/// A module on a trigger path that may modify the event (producer or filter).
///
/// One instance exists per schedule, so `&mut self` is never shared
/// between lanes.
pub trait Modifier: Send {
    /// Module label, unique within the job.
    fn label(&self) -> &str;

    /// Products this module puts.
    fn produces(&self) -> Vec<ProductDescription> {
        Vec::new()
    }

    /// Called once at the start of the job.
    fn begin_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Called once at the end of the job.
    fn end_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Start of a run.
    fn begin_run(&mut self, _run: &mut RunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// End of a run.
    fn end_run(&mut self, _run: &mut RunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Start of a sub-run.
    fn begin_subrun(&mut self, _subrun: &mut SubRunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// End of a sub-run.
    fn end_subrun(&mut self, _subrun: &mut SubRunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Process one event. Returning `false` rejects it on this path.
    fn process(&mut self, event: &mut EventPrincipal) -> Result<bool, ProcessingError>;
}

/// A read-only module on the end path (analyzer).
pub trait Observer: Send {
    /// Module label, unique within the job.
    fn label(&self) -> &str;

    /// Called once at the start of the job.
    fn begin_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Called once at the end of the job.
    fn end_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Start of a run.
    fn begin_run(&mut self, _run: &RunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// End of a run.
    fn end_run(&mut self, _run: &RunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Start of a sub-run.
    fn begin_subrun(&mut self, _subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// End of a sub-run.
    fn end_subrun(&mut self, _subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Observe one event.
    fn observe(&mut self, event: &EventPrincipal) -> Result<(), ProcessingError>;
}

/// Writes processed records to output files.
///
/// Output modules are shared by all schedules; the engine serializes every
/// call.
pub trait OutputModule: Send {
    /// Module label, unique within the job.
    fn label(&self) -> &str;

    /// Called once at the start of the job.
    fn begin_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Called once at the end of the job.
    fn end_job(&mut self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Open a new output file while `input` is the current input file.
    fn open_file(&mut self, input: &FileBlock) -> Result<(), ProcessingError>;

    /// Close the current output file.
    fn close_file(&mut self) -> Result<(), ProcessingError>;

    /// Write one accepted event.
    fn write_event(&mut self, event: &EventPrincipal) -> Result<(), ProcessingError>;

    /// Write a sub-run fragment.
    fn write_subrun(&mut self, subrun: &SubRunPrincipal) -> Result<(), ProcessingError>;

    /// Write a run fragment.
    fn write_run(&mut self, run: &RunPrincipal) -> Result<(), ProcessingError>;
}
