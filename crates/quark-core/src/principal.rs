//! Principals: the in-memory record of one run, sub-run or event.

use std::fmt;

use crate::id::{EventId, RunId, SubRunId};
use crate::product::{BranchType, ProductKey, ProductStore, ProductTables};
use crate::range::RangeSet;

/// Identifier types that name a principal.
pub trait PrincipalId: Copy + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Branch type of the principal's products.
    const BRANCH: BranchType;

    /// Whether the identifier is a flush record.
    fn is_flush(self) -> bool;
}

impl PrincipalId for RunId {
    const BRANCH: BranchType = BranchType::Run;

    fn is_flush(self) -> bool {
        RunId::is_flush(self)
    }
}

impl PrincipalId for SubRunId {
    const BRANCH: BranchType = BranchType::SubRun;

    fn is_flush(self) -> bool {
        SubRunId::is_flush(self)
    }
}

impl PrincipalId for EventId {
    const BRANCH: BranchType = BranchType::Event;

    fn is_flush(self) -> bool {
        EventId::is_flush(self)
    }
}

/// A run, sub-run or event with its products and covered event ranges.
#[derive(Debug)]
pub struct Principal<I: PrincipalId> {
    id: I,
    seen_ranges: RangeSet,
    products: ProductStore,
    last_in_subrun: bool,
}

/// A run record.
pub type RunPrincipal = Principal<RunId>;
/// A sub-run record.
pub type SubRunPrincipal = Principal<SubRunId>;
/// An event record.
pub type EventPrincipal = Principal<EventId>;

impl<I: PrincipalId> Principal<I> {
    /// A principal with no products and no seen ranges.
    pub fn new(id: I) -> Self {
        Self {
            id,
            seen_ranges: RangeSet::invalid(),
            products: ProductStore::default(),
            last_in_subrun: false,
        }
    }

    /// The identifier.
    pub fn id(&self) -> I {
        self.id
    }

    /// Whether this is a flush record.
    pub fn is_flush(&self) -> bool {
        self.id.is_flush()
    }

    /// Event ranges the current output fragment covers.
    pub fn seen_ranges(&self) -> &RangeSet {
        &self.seen_ranges
    }

    /// Replace the covered event ranges.
    pub fn update_seen_ranges(&mut self, ranges: RangeSet) {
        self.seen_ranges = ranges;
    }

    /// Create empty slots for every product declared for this branch type.
    pub fn create_groups_for_produced_products(&mut self, tables: &ProductTables) {
        self.products.create_groups(tables.keys(I::BRANCH));
    }

    /// Allow product lookups.
    pub fn enable_lookup_of_produced_products(&mut self) {
        self.products.enable_lookup();
    }

    /// The product slots.
    pub fn products(&self) -> &ProductStore {
        &self.products
    }

    /// The product slots, mutably.
    pub fn products_mut(&mut self) -> &mut ProductStore {
        &mut self.products
    }

    /// Shorthand for [`ProductStore::put`].
    pub fn put<T: std::any::Any + Send + Sync>(
        &mut self,
        key: &ProductKey,
        value: T,
    ) -> Result<(), crate::ProcessingError> {
        self.products.put(key, value)
    }

    /// Shorthand for [`ProductStore::get`].
    pub fn get<T: std::any::Any>(&self, key: &ProductKey) -> Result<&T, crate::ProcessingError> {
        self.products.get(key)
    }
}

impl EventPrincipal {
    /// Mark whether this is the last event of its sub-run.
    pub fn with_last_in_subrun(mut self, last: bool) -> Self {
        self.last_in_subrun = last;
        self
    }

    /// Whether this is the last event of its sub-run.
    pub fn is_last_in_subrun(&self) -> bool {
        self.last_in_subrun
    }
}

impl<I: PrincipalId> fmt::Display for Principal<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RunPrincipal>();
    assert::<SubRunPrincipal>();
    assert::<EventPrincipal>();
};
