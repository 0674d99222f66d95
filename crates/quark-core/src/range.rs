//! Event ranges and range sets.
//!
//! A [`RangeSet`] records which events of a single run a file fragment
//! covers, as half-open `[begin, end)` event-number intervals per sub-run.
//! Range sets from different lanes or different files of the same run can
//! be merged; merging is commutative and associative once normalized.

use std::fmt;

use smallvec::SmallVec;

use crate::error::ProcessingError;
use crate::id::RunId;

/// Errors produced by range construction and merging.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// `begin` is after `end`.
    #[error("invalid event range [{begin},{end}) in subrun {subrun}")]
    InvalidRange {
        /// Sub-run of the range.
        subrun: u32,
        /// Requested first event.
        begin: u32,
        /// Requested one-past-last event.
        end: u32,
    },
    /// Range sets of two different runs cannot be merged.
    #[error("cannot merge ranges of run {found} into range set of run {expected}")]
    RunMismatch {
        /// Run of the receiving set.
        expected: u32,
        /// Run of the merged-in set.
        found: u32,
    },
}

impl From<RangeError> for ProcessingError {
    fn from(e: RangeError) -> Self {
        ProcessingError::logic(e.to_string())
    }
}

// ── EventRange ─────────────────────────────────────────────────────

/// Half-open interval `[begin, end)` of event numbers within one sub-run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventRange {
    subrun: u32,
    begin: u32,
    end: u32,
}

impl EventRange {
    /// Create a range, rejecting `begin > end`.
    pub fn new(subrun: u32, begin: u32, end: u32) -> Result<Self, RangeError> {
        if begin > end {
            return Err(RangeError::InvalidRange { subrun, begin, end });
        }
        Ok(Self { subrun, begin, end })
    }

    /// The range holding exactly one event.
    pub fn for_event(subrun: u32, event: u32) -> Self {
        Self {
            subrun,
            begin: event,
            end: event.saturating_add(1),
        }
    }

    /// Sub-run number.
    pub fn subrun(&self) -> u32 {
        self.subrun
    }

    /// First event number.
    pub fn begin(&self) -> u32 {
        self.begin
    }

    /// One past the last event number.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of events covered.
    pub fn size(&self) -> u32 {
        self.end - self.begin
    }

    /// Whether the range covers no events.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Whether `event` of `subrun` is inside the range.
    pub fn contains(&self, subrun: u32, event: u32) -> bool {
        self.subrun == subrun && self.begin <= event && event < self.end
    }

    /// Whether `other` starts exactly where this range ends.
    pub fn is_adjacent(&self, other: &EventRange) -> bool {
        self.subrun == other.subrun && self.end == other.begin
    }

    /// Whether the two ranges share at least one event.
    pub fn overlaps(&self, other: &EventRange) -> bool {
        self.subrun == other.subrun && self.begin < other.end && other.begin < self.end
    }
}

impl fmt::Display for EventRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subrun {} [{},{})", self.subrun, self.begin, self.end)
    }
}

// ── RangeSet ───────────────────────────────────────────────────────

/// Sorted event ranges of a single run.
///
/// A set without a run is *invalid*: it describes nothing and is the
/// identity element of [`merge`](RangeSet::merge).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeSet {
    run: Option<u32>,
    ranges: SmallVec<[EventRange; 4]>,
}

impl RangeSet {
    /// The invalid (empty, run-less) set.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// A valid set for `run` covering no events yet.
    pub fn for_run(run: RunId) -> Self {
        Self {
            run: Some(run.run()),
            ranges: SmallVec::new(),
        }
    }

    /// A set for `run` holding `ranges`, sorted but not collapsed.
    pub fn new(run: RunId, ranges: impl IntoIterator<Item = EventRange>) -> Self {
        let mut ranges: SmallVec<[EventRange; 4]> = ranges.into_iter().collect();
        ranges.sort_unstable();
        Self {
            run: Some(run.run()),
            ranges,
        }
    }

    /// Run number, `None` for the invalid set.
    pub fn run(&self) -> Option<u32> {
        self.run
    }

    /// Whether the set belongs to a run.
    pub fn is_valid(&self) -> bool {
        self.run.is_some()
    }

    /// The ranges, in order.
    pub fn ranges(&self) -> &[EventRange] {
        &self.ranges
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges are recorded.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of events covered.
    pub fn event_count(&self) -> u64 {
        self.ranges.iter().map(|r| u64::from(r.size())).sum()
    }

    /// Whether the set covers `event` of `subrun` in `run`.
    pub fn contains(&self, run: u32, subrun: u32, event: u32) -> bool {
        self.run == Some(run) && self.ranges.iter().any(|r| r.contains(subrun, event))
    }

    /// Index of the range covering `event` of `subrun`.
    pub fn find(&self, subrun: u32, event: u32) -> Option<usize> {
        self.ranges.iter().position(|r| r.contains(subrun, event))
    }

    /// Whether no two ranges overlap.
    pub fn has_disjoint_ranges(&self) -> bool {
        self.ranges.windows(2).all(|w| !w[0].overlaps(&w[1]))
    }

    /// Sort, drop empty ranges, and coalesce adjacent or overlapping ranges.
    pub fn collapse(&mut self) {
        self.ranges.sort_unstable();
        let mut collapsed: SmallVec<[EventRange; 4]> = SmallVec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..).filter(|r| !r.is_empty()) {
            match collapsed.last_mut() {
                Some(last) if last.subrun == range.subrun && range.begin <= last.end => {
                    last.end = last.end.max(range.end);
                }
                _ => collapsed.push(range),
            }
        }
        self.ranges = collapsed;
    }

    /// Collapsed copy.
    pub fn collapsed(&self) -> Self {
        let mut copy = self.clone();
        copy.collapse();
        copy
    }

    /// Union `other` into this set. The result is collapsed.
    pub fn merge(&mut self, other: &RangeSet) -> Result<(), RangeError> {
        let Some(found) = other.run else {
            self.collapse();
            return Ok(());
        };
        match self.run {
            None => self.run = Some(found),
            Some(expected) if expected != found => {
                return Err(RangeError::RunMismatch { expected, found });
            }
            Some(_) => {}
        }
        self.ranges.extend(other.ranges.iter().copied());
        self.collapse();
        Ok(())
    }

    /// Record one more event, extending the last range when contiguous.
    pub fn push_event(&mut self, subrun: u32, event: u32) {
        let range = EventRange::for_event(subrun, event);
        if let Some(last) = self.ranges.last_mut() {
            if last.is_adjacent(&range) {
                last.end = range.end;
                return;
            }
        }
        let in_order = self.ranges.last().map_or(true, |last| *last < range);
        self.ranges.push(range);
        if !in_order {
            self.collapse();
        }
    }

    /// Split the range covering `event` of `subrun` so that a range starts
    /// at `event`. Returns the index of that range, or `None` when no range
    /// covers the event.
    pub fn split_range(&mut self, subrun: u32, event: u32) -> Option<usize> {
        let idx = self.find(subrun, event)?;
        let range = self.ranges[idx];
        if range.begin == event {
            return Some(idx);
        }
        self.ranges[idx].end = event;
        self.ranges.insert(
            idx + 1,
            EventRange {
                subrun,
                begin: event,
                end: range.end,
            },
        );
        Some(idx + 1)
    }

    /// Copy of the first `end_idx` ranges.
    pub fn truncated(&self, end_idx: usize) -> Self {
        Self {
            run: self.run,
            ranges: self.ranges[..end_idx.min(self.ranges.len())].into(),
        }
    }

    /// Drop the first `from` ranges.
    pub fn assign_ranges(&mut self, from: usize) {
        let from = from.min(self.ranges.len());
        self.ranges.drain(..from);
    }

    /// Split into the part before `event` of `subrun` and the part from it on.
    pub fn partition_at(&self, subrun: u32, event: u32) -> Option<(RangeSet, RangeSet)> {
        let mut copy = self.clone();
        let idx = copy.split_range(subrun, event)?;
        let head = copy.truncated(idx);
        copy.assign_ranges(idx);
        Some((head, copy))
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.run {
            None => write!(f, "invalid range set"),
            Some(run) => {
                write!(f, "run {run}:")?;
                for range in &self.ranges {
                    write!(f, " {range}")?;
                }
                Ok(())
            }
        }
    }
}
