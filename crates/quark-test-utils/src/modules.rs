use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use quark_core::{
    ErrorCategory, EventId, EventPrincipal, Modifier, Observer, ProcessingError,
    ProductDescription, ProductKey, RunPrincipal, ScheduleId, SubRunPrincipal,
};

use crate::journal::Journal;

/// Puts the event number into every event under `<label>:`.
#[derive(Clone, Debug)]
pub struct EventNumberProducer {
    label: String,
}

impl EventNumberProducer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.label.as_str(), "")
    }
}

impl Modifier for EventNumberProducer {
    fn label(&self) -> &str {
        &self.label
    }

    fn produces(&self) -> Vec<ProductDescription> {
        vec![ProductDescription::event(self.label.as_str(), "")]
    }

    fn process(&mut self, event: &mut EventPrincipal) -> Result<bool, ProcessingError> {
        let number = event.id().event();
        event.put(&self.key(), number)?;
        Ok(true)
    }
}

/// Rejects every event whose number is in the list.
#[derive(Clone, Debug)]
pub struct RejectingFilter {
    label: String,
    reject: Vec<u32>,
}

impl RejectingFilter {
    pub fn new(label: impl Into<String>, reject: impl IntoIterator<Item = u32>) -> Self {
        Self {
            label: label.into(),
            reject: reject.into_iter().collect(),
        }
    }
}

impl Modifier for RejectingFilter {
    fn label(&self) -> &str {
        &self.label
    }

    fn process(&mut self, event: &mut EventPrincipal) -> Result<bool, ProcessingError> {
        Ok(!self.reject.contains(&event.id().event()))
    }
}

/// Fails with `category` on the listed event numbers, or on every event
/// when the list is empty.
#[derive(Clone, Debug)]
pub struct FailingModifier {
    label: String,
    category: ErrorCategory,
    events: Vec<u32>,
}

impl FailingModifier {
    pub fn new(
        label: impl Into<String>,
        category: ErrorCategory,
        events: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            label: label.into(),
            category,
            events: events.into_iter().collect(),
        }
    }
}

impl Modifier for FailingModifier {
    fn label(&self) -> &str {
        &self.label
    }

    fn process(&mut self, event: &mut EventPrincipal) -> Result<bool, ProcessingError> {
        let n = event.id().event();
        if self.events.is_empty() || self.events.contains(&n) {
            return Err(ProcessingError::new(
                self.category,
                format!("{} refuses event {}", self.label, event.id()),
            ));
        }
        Ok(true)
    }
}

/// Panics on the given event number.
#[derive(Clone, Debug)]
pub struct PanickingModifier {
    label: String,
    event: u32,
}

impl PanickingModifier {
    pub fn new(label: impl Into<String>, event: u32) -> Self {
        Self {
            label: label.into(),
            event,
        }
    }
}

impl Modifier for PanickingModifier {
    fn label(&self) -> &str {
        &self.label
    }

    fn process(&mut self, event: &mut EventPrincipal) -> Result<bool, ProcessingError> {
        if event.id().event() == self.event {
            panic!("{} panicked on {}", self.label, event.id());
        }
        Ok(true)
    }
}

type ProcessFn = dyn FnMut(&mut EventPrincipal) -> Result<bool, ProcessingError> + Send;

/// Modifier wrapping a closure.
pub struct FnModifier {
    label: String,
    f: Box<ProcessFn>,
}

impl FnModifier {
    pub fn new(
        label: impl Into<String>,
        f: impl FnMut(&mut EventPrincipal) -> Result<bool, ProcessingError> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            f: Box::new(f),
        }
    }
}

impl std::fmt::Debug for FnModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModifier")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Modifier for FnModifier {
    fn label(&self) -> &str {
        &self.label
    }

    fn process(&mut self, event: &mut EventPrincipal) -> Result<bool, ProcessingError> {
        (self.f)(event)
    }
}

// ── Observers ──────────────────────────────────────────────────────

/// Events seen by [`RecordingObserver`]s, tagged by schedule.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<(ScheduleId, EventId)>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(ScheduleId, EventId)> {
        self.0.lock().clone()
    }

    /// Observed events in observation order.
    pub fn events(&self) -> Vec<EventId> {
        self.0.lock().iter().map(|(_, id)| *id).collect()
    }

    /// Observed events grouped by schedule, each in that lane's order.
    pub fn per_schedule(&self) -> BTreeMap<ScheduleId, Vec<EventId>> {
        let mut lanes: BTreeMap<ScheduleId, Vec<EventId>> = BTreeMap::new();
        for (sid, id) in self.0.lock().iter() {
            lanes.entry(*sid).or_default().push(*id);
        }
        lanes
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Observer logging every event it sees.
#[derive(Clone, Debug)]
pub struct RecordingObserver {
    label: String,
    schedule: ScheduleId,
    log: EventLog,
}

impl RecordingObserver {
    pub fn new(label: impl Into<String>, schedule: ScheduleId, log: EventLog) -> Self {
        Self {
            label: label.into(),
            schedule,
            log,
        }
    }
}

impl Observer for RecordingObserver {
    fn label(&self) -> &str {
        &self.label
    }

    fn observe(&mut self, event: &EventPrincipal) -> Result<(), ProcessingError> {
        self.log.0.lock().push((self.schedule, event.id()));
        Ok(())
    }
}

/// Observer journaling job, run and sub-run transitions.
///
/// Entries look like `begin_run run 1` or `end_subrun run 1 subrun 0`.
#[derive(Clone, Debug)]
pub struct TransitionRecorder {
    label: String,
    journal: Journal,
}

impl TransitionRecorder {
    pub fn new(label: impl Into<String>, journal: Journal) -> Self {
        Self {
            label: label.into(),
            journal,
        }
    }
}

impl Observer for TransitionRecorder {
    fn label(&self) -> &str {
        &self.label
    }

    fn begin_job(&mut self) -> Result<(), ProcessingError> {
        self.journal.push("begin_job");
        Ok(())
    }

    fn end_job(&mut self) -> Result<(), ProcessingError> {
        self.journal.push("end_job");
        Ok(())
    }

    fn begin_run(&mut self, run: &RunPrincipal) -> Result<(), ProcessingError> {
        self.journal.push(format!("begin_run {}", run.id()));
        Ok(())
    }

    fn end_run(&mut self, run: &RunPrincipal) -> Result<(), ProcessingError> {
        self.journal.push(format!("end_run {}", run.id()));
        Ok(())
    }

    fn begin_subrun(&mut self, subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        self.journal.push(format!("begin_subrun {}", subrun.id()));
        Ok(())
    }

    fn end_subrun(&mut self, subrun: &SubRunPrincipal) -> Result<(), ProcessingError> {
        self.journal.push(format!("end_subrun {}", subrun.id()));
        Ok(())
    }

    fn observe(&mut self, event: &EventPrincipal) -> Result<(), ProcessingError> {
        self.journal.push(format!("event {}", event.id()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_puts_event_number() {
        let mut producer = EventNumberProducer::new("numbers");
        let mut event = EventPrincipal::new(EventId::new(1, 0, 42));
        let mut tables = quark_core::ProductTables::new();
        for d in producer.produces() {
            tables.insert(d);
        }
        event.create_groups_for_produced_products(&tables);
        assert!(producer.process(&mut event).unwrap());
        event.enable_lookup_of_produced_products();
        assert_eq!(*event.get::<u32>(&producer.key()).unwrap(), 42);
    }

    #[test]
    fn failing_modifier_targets_listed_events() {
        let mut m = FailingModifier::new("bad", ErrorCategory::DataCorruption, [2]);
        assert!(m
            .process(&mut EventPrincipal::new(EventId::new(1, 0, 1)))
            .unwrap());
        let err = m
            .process(&mut EventPrincipal::new(EventId::new(1, 0, 2)))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DataCorruption);
    }

    #[test]
    fn event_log_groups_by_schedule() {
        let log = EventLog::new();
        let mut a = RecordingObserver::new("obs", ScheduleId(0), log.clone());
        let mut b = RecordingObserver::new("obs", ScheduleId(1), log.clone());
        a.observe(&EventPrincipal::new(EventId::new(1, 0, 1))).unwrap();
        b.observe(&EventPrincipal::new(EventId::new(1, 0, 2))).unwrap();
        a.observe(&EventPrincipal::new(EventId::new(1, 0, 3))).unwrap();
        let lanes = log.per_schedule();
        assert_eq!(
            lanes[&ScheduleId(0)],
            vec![EventId::new(1, 0, 1), EventId::new(1, 0, 3)]
        );
        assert_eq!(log.len(), 3);
    }
}
