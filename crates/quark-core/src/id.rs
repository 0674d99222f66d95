//! Strongly-typed identifiers for runs, sub-runs, events and schedules.
//!
//! Every level of the hierarchy reserves the number `u32::MAX` for a
//! *flush* record: a pseudo-record an input source may emit to mark the
//! end of a sequence. Flush records flow through the level machine like
//! ordinary ones but never trigger begin/end work and are never written.

use std::fmt;

/// Number reserved for flush records at every level.
const FLUSH_NUMBER: u32 = u32::MAX;

fn write_number(f: &mut fmt::Formatter<'_>, n: u32) -> fmt::Result {
    if n == FLUSH_NUMBER {
        write!(f, "flush")
    } else {
        write!(f, "{n}")
    }
}

// ── RunId ──────────────────────────────────────────────────────────

/// Identifies a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u32);

impl RunId {
    /// Create a run identifier. `u32::MAX` is reserved for [`RunId::flush`].
    pub const fn new(run: u32) -> Self {
        Self(run)
    }

    /// The flush run.
    pub const fn flush() -> Self {
        Self(FLUSH_NUMBER)
    }

    /// The run number.
    pub const fn run(self) -> u32 {
        self.0
    }

    /// Whether this is the flush run.
    pub const fn is_flush(self) -> bool {
        self.0 == FLUSH_NUMBER
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run ")?;
        write_number(f, self.0)
    }
}

impl From<u32> for RunId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

// ── SubRunId ───────────────────────────────────────────────────────

/// Identifies a sub-run within a run.
///
/// Ordering is by run number, then sub-run number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubRunId {
    run: RunId,
    subrun: u32,
}

impl SubRunId {
    /// Create a sub-run identifier.
    pub const fn new(run: u32, subrun: u32) -> Self {
        Self {
            run: RunId::new(run),
            subrun,
        }
    }

    /// The flush sub-run of `run`.
    pub const fn flush(run: RunId) -> Self {
        Self {
            run,
            subrun: FLUSH_NUMBER,
        }
    }

    /// The enclosing run.
    pub const fn run_id(self) -> RunId {
        self.run
    }

    /// The run number.
    pub const fn run(self) -> u32 {
        self.run.run()
    }

    /// The sub-run number.
    pub const fn subrun(self) -> u32 {
        self.subrun
    }

    /// Whether this sub-run, or its run, is a flush record.
    pub const fn is_flush(self) -> bool {
        self.subrun == FLUSH_NUMBER || self.run.is_flush()
    }
}

impl fmt::Display for SubRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} subrun ", self.run)?;
        write_number(f, self.subrun)
    }
}

// ── EventId ────────────────────────────────────────────────────────

/// Identifies an event within a sub-run.
///
/// Ordering is by run, sub-run, then event number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    subrun: SubRunId,
    event: u32,
}

impl EventId {
    /// Create an event identifier.
    pub const fn new(run: u32, subrun: u32, event: u32) -> Self {
        Self {
            subrun: SubRunId::new(run, subrun),
            event,
        }
    }

    /// The flush event of `subrun`.
    pub const fn flush(subrun: SubRunId) -> Self {
        Self {
            subrun,
            event: FLUSH_NUMBER,
        }
    }

    /// The enclosing sub-run.
    pub const fn subrun_id(self) -> SubRunId {
        self.subrun
    }

    /// The enclosing run.
    pub const fn run_id(self) -> RunId {
        self.subrun.run_id()
    }

    /// The run number.
    pub const fn run(self) -> u32 {
        self.subrun.run()
    }

    /// The sub-run number.
    pub const fn subrun(self) -> u32 {
        self.subrun.subrun()
    }

    /// The event number.
    pub const fn event(self) -> u32 {
        self.event
    }

    /// Whether this event, or any enclosing level, is a flush record.
    pub const fn is_flush(self) -> bool {
        self.event == FLUSH_NUMBER || self.subrun.is_flush()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} event ", self.subrun)?;
        write_number(f, self.event)
    }
}

// ── ScheduleId ─────────────────────────────────────────────────────

/// Index of an execution lane. Schedule 0 is the primary schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleId(pub usize);

impl ScheduleId {
    /// The primary schedule.
    pub const fn first() -> Self {
        Self(0)
    }

    /// The lane index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ScheduleId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}
