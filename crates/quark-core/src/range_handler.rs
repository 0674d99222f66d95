//! Range-set handlers: per-lane bookkeeping of which events an output
//! fragment of a run or sub-run covers.
//!
//! Two strategies exist. An [`OpenRangeSetHandler`] learns its ranges from
//! the events actually written. A [`ClosedRangeSetHandler`] is seeded by the
//! input source with the complete ranges up front and only tracks how far
//! they have been emitted, splitting a range when an output file switch
//! lands in the middle of it.

use crate::id::{EventId, RunId};
use crate::range::RangeSet;

/// Which handler strategy is in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Ranges discovered from written events.
    Open,
    /// Ranges known up front.
    Closed,
}

/// Last event recorded by a closed handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventInfo {
    /// The event.
    pub id: EventId,
    /// Whether it was the last event of its sub-run.
    pub last_in_subrun: bool,
}

// ── Open ───────────────────────────────────────────────────────────

/// Accumulates `[e, e+1)` for every event written since the last rebase.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenRangeSetHandler {
    ranges: RangeSet,
}

impl OpenRangeSetHandler {
    /// Handler for `run` with nothing seen yet.
    pub fn new(run: RunId) -> Self {
        Self {
            ranges: RangeSet::for_run(run),
        }
    }

    fn update(&mut self, id: EventId) {
        if id.is_flush() {
            return;
        }
        debug_assert_eq!(self.ranges.run(), Some(id.run()));
        self.ranges.push_event(id.subrun(), id.event());
    }

    fn rebase(&mut self) {
        self.ranges.assign_ranges(self.ranges.len());
    }
}

// ── Closed ─────────────────────────────────────────────────────────

/// Walks a source-provided range set, tracking the emitted prefix.
///
/// `ranges[..boundary]` has been accounted for by the current output
/// fragment; everything from `boundary` on belongs to later fragments.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedRangeSetHandler {
    ranges: RangeSet,
    boundary: usize,
    last_event: Option<EventInfo>,
}

impl ClosedRangeSetHandler {
    /// Handler over the complete `ranges` of a run or sub-run.
    pub fn new(ranges: RangeSet) -> Self {
        Self {
            ranges,
            boundary: 0,
            last_event: None,
        }
    }

    /// Index one past the last emitted range.
    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// All ranges still held, emitted or not.
    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    /// The last event recorded.
    pub fn event_info(&self) -> Option<EventInfo> {
        self.last_event
    }

    fn update(&mut self, id: EventId, last_in_subrun: bool) {
        if id.is_flush() {
            return;
        }
        self.last_event = Some(EventInfo { id, last_in_subrun });
        if last_in_subrun {
            let subrun = id.subrun();
            let ranges = self.ranges.ranges();
            while self.boundary < ranges.len() && ranges[self.boundary].subrun() <= subrun {
                self.boundary += 1;
            }
        }
    }

    fn flush_ranges(&mut self) {
        self.boundary = self.ranges.len();
    }

    fn maybe_split_range(&mut self) {
        if self.boundary == self.ranges.len() {
            return;
        }
        let Some(info) = self.last_event else {
            return;
        };
        if info.last_in_subrun {
            return;
        }
        let (subrun, event) = (info.id.subrun(), info.id.event());
        let Some(idx) = self.ranges.find(subrun, event) else {
            return;
        };
        if idx < self.boundary {
            return;
        }
        let next = event.saturating_add(1);
        if next >= self.ranges.ranges()[idx].end() {
            self.boundary = idx + 1;
            return;
        }
        if let Some(upper) = self.ranges.split_range(subrun, next) {
            self.boundary = upper;
        }
    }

    fn rebase(&mut self) {
        self.ranges.assign_ranges(self.boundary);
        self.boundary = 0;
    }
}

// ── RangeSetHandler ────────────────────────────────────────────────

/// A range-set handler of either kind.
#[derive(Clone, Debug, PartialEq)]
pub enum RangeSetHandler {
    /// See [`OpenRangeSetHandler`].
    Open(OpenRangeSetHandler),
    /// See [`ClosedRangeSetHandler`].
    Closed(ClosedRangeSetHandler),
}

impl RangeSetHandler {
    /// An open handler for `run`.
    pub fn open(run: RunId) -> Self {
        Self::Open(OpenRangeSetHandler::new(run))
    }

    /// A closed handler over `ranges`.
    pub fn closed(ranges: RangeSet) -> Self {
        Self::Closed(ClosedRangeSetHandler::new(ranges))
    }

    /// The strategy.
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Open(_) => HandlerKind::Open,
            Self::Closed(_) => HandlerKind::Closed,
        }
    }

    /// Ranges covered by the current output fragment.
    pub fn seen_ranges(&self) -> RangeSet {
        match self {
            Self::Open(h) => h.ranges.clone(),
            Self::Closed(h) => h.ranges.truncated(h.boundary),
        }
    }

    /// Record that `id` was written. Flush events are ignored.
    pub fn update(&mut self, id: EventId, last_in_subrun: bool) {
        match self {
            Self::Open(h) => h.update(id),
            Self::Closed(h) => h.update(id, last_in_subrun),
        }
    }

    /// Mark every remaining range as emitted (end of run or sub-run).
    pub fn flush_ranges(&mut self) {
        if let Self::Closed(h) = self {
            h.flush_ranges();
        }
    }

    /// Close the current fragment just after the last recorded event,
    /// splitting a range if the event falls inside one.
    pub fn maybe_split_range(&mut self) {
        if let Self::Closed(h) = self {
            h.maybe_split_range();
        }
    }

    /// Forget everything already emitted, after an output file closed.
    pub fn rebase(&mut self) {
        match self {
            Self::Open(h) => h.rebase(),
            Self::Closed(h) => h.rebase(),
        }
    }

    /// The last event recorded by a closed handler.
    pub fn last_event(&self) -> Option<EventId> {
        match self {
            Self::Open(_) => None,
            Self::Closed(h) => h.last_event.map(|info| info.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::EventRange;

    fn closed_run() -> RangeSetHandler {
        RangeSetHandler::closed(RangeSet::new(
            RunId::new(1),
            [
                EventRange::new(0, 1, 11).unwrap(),
                EventRange::new(1, 1, 5).unwrap(),
            ],
        ))
    }

    #[test]
    fn open_handler_records_written_events() {
        let mut h = RangeSetHandler::open(RunId::new(1));
        for e in 1..=4 {
            h.update(EventId::new(1, 0, e), false);
        }
        h.update(EventId::flush(crate::SubRunId::new(1, 0)), false);
        assert_eq!(h.seen_ranges().ranges(), &[EventRange::new(0, 1, 5).unwrap()]);
        h.rebase();
        assert!(h.seen_ranges().is_empty());
        assert!(h.seen_ranges().is_valid());
    }

    #[test]
    fn closed_handler_splits_after_last_event() {
        let mut h = closed_run();
        h.update(EventId::new(1, 0, 5), false);
        assert!(h.seen_ranges().is_empty());
        h.maybe_split_range();
        assert_eq!(h.seen_ranges().ranges(), &[EventRange::new(0, 1, 6).unwrap()]);
        h.rebase();
        h.update(EventId::new(1, 0, 10), true);
        h.update(EventId::new(1, 1, 4), true);
        assert_eq!(
            h.seen_ranges().ranges(),
            &[
                EventRange::new(0, 6, 11).unwrap(),
                EventRange::new(1, 1, 5).unwrap()
            ]
        );
    }

    #[test]
    fn closed_handler_boundary_advances_at_end_of_subrun() {
        let mut h = closed_run();
        h.update(EventId::new(1, 0, 10), true);
        assert_eq!(h.seen_ranges().ranges(), &[EventRange::new(0, 1, 11).unwrap()]);
        h.maybe_split_range();
        assert_eq!(h.seen_ranges().len(), 1);
    }

    #[test]
    fn split_at_range_end_moves_boundary_without_splitting() {
        let mut h = closed_run();
        h.update(EventId::new(1, 0, 10), false);
        h.maybe_split_range();
        assert_eq!(h.seen_ranges().ranges(), &[EventRange::new(0, 1, 11).unwrap()]);
    }

    #[test]
    fn closed_handler_exposes_its_progress() {
        let RangeSetHandler::Closed(mut h) = closed_run() else {
            panic!("expected a closed handler");
        };
        assert_eq!(h.boundary(), 0);
        assert_eq!(h.event_info(), None);
        h.update(EventId::new(1, 0, 10), true);
        assert_eq!(h.boundary(), 1);
        assert_eq!(
            h.event_info(),
            Some(EventInfo {
                id: EventId::new(1, 0, 10),
                last_in_subrun: true,
            })
        );
        assert_eq!(h.ranges().len(), 2, "emitted ranges are kept until rebase");
        h.rebase();
        assert_eq!(h.boundary(), 0);
        assert_eq!(h.ranges().ranges(), &[EventRange::new(1, 1, 5).unwrap()]);
    }

    #[test]
    fn flush_emits_everything() {
        let mut h = closed_run();
        h.flush_ranges();
        assert_eq!(h.seen_ranges().len(), 2);
        h.rebase();
        assert!(h.seen_ranges().is_empty());
    }
}
