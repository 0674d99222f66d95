use std::ops::Range;

use quark_core::{
    ErrorCategory, EventId, EventPrincipal, FileBlock, InputSource, ItemType, ProcessingError,
    RangeSet, RangeSetHandler, RunId, RunPrincipal, SubRunId, SubRunPrincipal,
};

/// One record of a [`ScriptedSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptItem {
    File(String),
    Run(u32),
    FlushRun,
    SubRun(u32),
    FlushSubRun,
    Event(u32),
    FlushEvent,
    Invalid,
}

impl ScriptItem {
    fn item_type(&self) -> ItemType {
        match self {
            Self::File(_) => ItemType::File,
            Self::Run(_) | Self::FlushRun => ItemType::Run,
            Self::SubRun(_) | Self::FlushSubRun => ItemType::SubRun,
            Self::Event(_) | Self::FlushEvent => ItemType::Event,
            Self::Invalid => ItemType::Invalid,
        }
    }
}

/// Input source replaying a fixed script.
///
/// Built with chained calls:
///
/// ```
/// use quark_test_utils::ScriptedSource;
///
/// let source = ScriptedSource::new()
///     .file("a.root")
///     .run(1)
///     .subrun(0)
///     .events(1..11);
/// assert_eq!(source.event_count(), 10);
/// ```
///
/// Range-set handlers are Open by default. With
/// [`closed_ranges`](Self::closed_ranges) the source hands out Closed
/// handlers holding every event the script has for the run or sub-run
/// within the current file.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    script: Vec<ScriptItem>,
    next: usize,
    announced: Option<usize>,
    closed: bool,
    run: Option<RunId>,
    run_ranges: Option<RangeSet>,
    subrun_ranges: Option<RangeSet>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, item: ScriptItem) -> Self {
        self.script.push(item);
        self
    }

    pub fn file(self, name: impl Into<String>) -> Self {
        self.item(ScriptItem::File(name.into()))
    }

    pub fn run(self, run: u32) -> Self {
        self.item(ScriptItem::Run(run))
    }

    pub fn flush_run(self) -> Self {
        self.item(ScriptItem::FlushRun)
    }

    pub fn subrun(self, subrun: u32) -> Self {
        self.item(ScriptItem::SubRun(subrun))
    }

    pub fn flush_subrun(self) -> Self {
        self.item(ScriptItem::FlushSubRun)
    }

    pub fn event(self, event: u32) -> Self {
        self.item(ScriptItem::Event(event))
    }

    pub fn events(mut self, events: Range<u32>) -> Self {
        self.script.extend(events.map(ScriptItem::Event));
        self
    }

    pub fn flush_event(self) -> Self {
        self.item(ScriptItem::FlushEvent)
    }

    pub fn invalid(self) -> Self {
        self.item(ScriptItem::Invalid)
    }

    /// Hand out Closed range-set handlers.
    pub fn closed_ranges(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn script(&self) -> &[ScriptItem] {
        &self.script
    }

    /// Number of non-flush events in the script.
    pub fn event_count(&self) -> usize {
        self.script
            .iter()
            .filter(|i| matches!(i, ScriptItem::Event(_)))
            .count()
    }

    fn take_announced(&mut self, expected: ItemType) -> Result<(usize, ScriptItem), ProcessingError> {
        let idx = self.announced.take().ok_or_else(|| {
            ProcessingError::logic(format!("read of {expected} without an announcement"))
        })?;
        let item = self.script[idx].clone();
        if item.item_type() != expected {
            return Err(ProcessingError::logic(format!(
                "read of {expected} but {} was announced",
                item.item_type()
            )));
        }
        Ok((idx, item))
    }

    /// Every event of the script from `from` up to the next item matching
    /// `stop`, as ranges of `run`.
    fn ranges_ahead(
        &self,
        from: usize,
        run: RunId,
        mut subrun: Option<u32>,
        stop: impl Fn(&ScriptItem) -> bool,
    ) -> RangeSet {
        let mut ranges = RangeSet::for_run(run);
        for item in &self.script[from..] {
            if stop(item) {
                break;
            }
            match item {
                ScriptItem::SubRun(n) => subrun = Some(*n),
                ScriptItem::FlushSubRun => subrun = None,
                ScriptItem::Event(e) => {
                    if let Some(s) = subrun {
                        ranges.push_event(s, *e);
                    }
                }
                _ => {}
            }
        }
        ranges
    }

    fn is_last_in_subrun(&self, idx: usize) -> bool {
        !matches!(
            self.script.get(idx + 1),
            Some(ScriptItem::Event(_) | ScriptItem::FlushEvent)
        )
    }
}

impl InputSource for ScriptedSource {
    fn label(&self) -> &str {
        "scripted"
    }

    fn next_item_type(&mut self) -> Result<ItemType, ProcessingError> {
        let Some(item) = self.script.get(self.next) else {
            return Ok(ItemType::Stop);
        };
        let item_type = item.item_type();
        self.announced = Some(self.next);
        self.next += 1;
        Ok(item_type)
    }

    fn read_file(&mut self) -> Result<Option<FileBlock>, ProcessingError> {
        match self.take_announced(ItemType::File)?.1 {
            ScriptItem::File(name) => Ok(Some(FileBlock::new(name))),
            other => Err(ProcessingError::logic(format!("unexpected {other:?}"))),
        }
    }

    fn read_run(&mut self) -> Result<RunPrincipal, ProcessingError> {
        let from = self.next;
        let id = match self.take_announced(ItemType::Run)?.1 {
            ScriptItem::Run(n) => RunId::new(n),
            _ => RunId::flush(),
        };
        let ranges = self.closed.then(|| {
            self.ranges_ahead(from, id, None, |i| {
                matches!(i, ScriptItem::Run(_) | ScriptItem::FlushRun | ScriptItem::File(_))
            })
        });
        self.run = Some(id);
        self.run_ranges = ranges;
        Ok(RunPrincipal::new(id))
    }

    fn read_subrun(&mut self, run: &RunPrincipal) -> Result<SubRunPrincipal, ProcessingError> {
        let from = self.next;
        let id = match self.take_announced(ItemType::SubRun)?.1 {
            ScriptItem::SubRun(n) => SubRunId::new(run.id().run(), n),
            _ => SubRunId::flush(run.id()),
        };
        let ranges = self.closed.then(|| {
            let subrun = (!id.is_flush()).then_some(id.subrun());
            self.ranges_ahead(from, run.id(), subrun, |i| {
                matches!(
                    i,
                    ScriptItem::SubRun(_)
                        | ScriptItem::FlushSubRun
                        | ScriptItem::Run(_)
                        | ScriptItem::FlushRun
                        | ScriptItem::File(_)
                )
            })
        });
        self.subrun_ranges = ranges;
        Ok(SubRunPrincipal::new(id))
    }

    fn read_event(&mut self, subrun: &SubRunPrincipal) -> Result<EventPrincipal, ProcessingError> {
        let (idx, item) = self.take_announced(ItemType::Event)?;
        let id = match item {
            ScriptItem::Event(n) if !subrun.is_flush() => {
                EventId::new(subrun.id().run(), subrun.id().subrun(), n)
            }
            ScriptItem::Event(n) => {
                return Err(ProcessingError::new(
                    ErrorCategory::DataCorruption,
                    format!("event {n} scripted inside flush {}", subrun.id()),
                ))
            }
            _ => EventId::flush(subrun.id()),
        };
        Ok(EventPrincipal::new(id).with_last_in_subrun(self.is_last_in_subrun(idx)))
    }

    fn run_range_set_handler(&self) -> RangeSetHandler {
        match &self.run_ranges {
            Some(ranges) => RangeSetHandler::closed(ranges.clone()),
            None => RangeSetHandler::open(self.run.unwrap_or_else(RunId::flush)),
        }
    }

    fn subrun_range_set_handler(&self) -> RangeSetHandler {
        match &self.subrun_ranges {
            Some(ranges) => RangeSetHandler::closed(ranges.clone()),
            None => RangeSetHandler::open(self.run.unwrap_or_else(RunId::flush)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quark_core::{EventRange, HandlerKind};

    #[test]
    fn replays_item_types_then_stops() {
        let mut s = ScriptedSource::new().file("f").run(1).subrun(0).event(1);
        let types: Vec<ItemType> = (0..5).map(|_| s.next_item_type().unwrap()).collect();
        assert_eq!(
            types,
            vec![
                ItemType::File,
                ItemType::Run,
                ItemType::SubRun,
                ItemType::Event,
                ItemType::Stop
            ]
        );
    }

    #[test]
    fn reads_follow_announcements() {
        let mut s = ScriptedSource::new().file("f").run(3).subrun(2).events(5..7);
        s.next_item_type().unwrap();
        assert_eq!(s.read_file().unwrap().unwrap().file_name(), "f");
        s.next_item_type().unwrap();
        let run = s.read_run().unwrap();
        s.next_item_type().unwrap();
        let subrun = s.read_subrun(&run).unwrap();
        s.next_item_type().unwrap();
        let e5 = s.read_event(&subrun).unwrap();
        s.next_item_type().unwrap();
        let e6 = s.read_event(&subrun).unwrap();
        assert_eq!(e5.id(), EventId::new(3, 2, 5));
        assert!(!e5.is_last_in_subrun());
        assert!(e6.is_last_in_subrun());
        assert!(s.read_event(&subrun).is_err());
    }

    #[test]
    fn closed_ranges_cover_the_run_in_this_file() {
        let mut s = ScriptedSource::new()
            .file("f")
            .run(1)
            .subrun(0)
            .events(1..4)
            .subrun(1)
            .events(1..3)
            .file("g")
            .run(1)
            .subrun(2)
            .event(1)
            .closed_ranges();
        s.next_item_type().unwrap();
        s.read_file().unwrap();
        s.next_item_type().unwrap();
        let run = s.read_run().unwrap();
        let rsh = s.run_range_set_handler();
        assert_eq!(rsh.kind(), HandlerKind::Closed);
        assert_eq!(
            rsh.seen_ranges().len(),
            0,
            "nothing emitted before any event is written"
        );
        let mut full = rsh.clone();
        full.flush_ranges();
        assert_eq!(
            full.seen_ranges(),
            RangeSet::new(
                RunId::new(1),
                [
                    EventRange::new(0, 1, 4).unwrap(),
                    EventRange::new(1, 1, 3).unwrap()
                ]
            )
        );
        s.next_item_type().unwrap();
        s.read_subrun(&run).unwrap();
        let mut sr = s.subrun_range_set_handler();
        sr.flush_ranges();
        assert_eq!(
            sr.seen_ranges(),
            RangeSet::new(RunId::new(1), [EventRange::new(0, 1, 4).unwrap()])
        );
    }

    #[test]
    fn flush_records() {
        let mut s = ScriptedSource::new()
            .file("f")
            .flush_run()
            .flush_subrun()
            .flush_event();
        s.next_item_type().unwrap();
        s.read_file().unwrap();
        s.next_item_type().unwrap();
        let run = s.read_run().unwrap();
        assert!(run.is_flush());
        s.next_item_type().unwrap();
        let subrun = s.read_subrun(&run).unwrap();
        assert!(subrun.is_flush());
        s.next_item_type().unwrap();
        assert!(s.read_event(&subrun).unwrap().is_flush());
    }
}
