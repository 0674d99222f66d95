//! Declared products and the per-principal product store.

use std::any::Any;
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::error::{ErrorCategory, ProcessingError};

/// Which principal a product lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchType {
    /// Per-run products.
    Run,
    /// Per-sub-run products.
    SubRun,
    /// Per-event products.
    Event,
}

/// Identifies a product slot: the producing module and an instance name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductKey {
    module_label: String,
    instance: String,
}

impl ProductKey {
    /// Key for `instance` of `module_label`. The default instance is `""`.
    pub fn new(module_label: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            module_label: module_label.into(),
            instance: instance.into(),
        }
    }

    /// Producing module.
    pub fn module_label(&self) -> &str {
        &self.module_label
    }

    /// Instance name.
    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module_label, self.instance)
    }
}

/// A module's declaration that it will put a product.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProductDescription {
    /// Slot the product goes into.
    pub key: ProductKey,
    /// Principal it is put into.
    pub branch: BranchType,
}

impl ProductDescription {
    /// Declare an event product.
    pub fn event(module_label: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            key: ProductKey::new(module_label, instance),
            branch: BranchType::Event,
        }
    }

    /// Declare a sub-run product.
    pub fn subrun(module_label: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            key: ProductKey::new(module_label, instance),
            branch: BranchType::SubRun,
        }
    }

    /// Declare a run product.
    pub fn run(module_label: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            key: ProductKey::new(module_label, instance),
            branch: BranchType::Run,
        }
    }
}

/// All products declared by the job, per branch type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductTables {
    run: IndexSet<ProductKey>,
    subrun: IndexSet<ProductKey>,
    event: IndexSet<ProductKey>,
}

impl ProductTables {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration. Returns `false` if it was already present.
    pub fn insert(&mut self, description: ProductDescription) -> bool {
        self.table_mut(description.branch).insert(description.key)
    }

    /// Declared keys for `branch`, in declaration order.
    pub fn keys(&self, branch: BranchType) -> impl Iterator<Item = &ProductKey> {
        self.table(branch).iter()
    }

    /// Total number of declarations.
    pub fn len(&self) -> usize {
        self.run.len() + self.subrun.len() + self.event.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self, branch: BranchType) -> &IndexSet<ProductKey> {
        match branch {
            BranchType::Run => &self.run,
            BranchType::SubRun => &self.subrun,
            BranchType::Event => &self.event,
        }
    }

    fn table_mut(&mut self, branch: BranchType) -> &mut IndexSet<ProductKey> {
        match branch {
            BranchType::Run => &mut self.run,
            BranchType::SubRun => &mut self.subrun,
            BranchType::Event => &mut self.event,
        }
    }
}

type Slot = Option<Box<dyn Any + Send + Sync>>;

/// Product slots of one principal.
///
/// Slots are created for every declared product when the principal is
/// read. Lookups fail until [`enable_lookup`](Self::enable_lookup) is called.
#[derive(Default)]
pub struct ProductStore {
    slots: IndexMap<ProductKey, Slot>,
    lookup_enabled: bool,
}

impl ProductStore {
    /// Create an empty slot for each key.
    pub fn create_groups<'a>(&mut self, keys: impl IntoIterator<Item = &'a ProductKey>) {
        for key in keys {
            self.slots.entry(key.clone()).or_insert(None);
        }
    }

    /// Allow lookups.
    pub fn enable_lookup(&mut self) {
        self.lookup_enabled = true;
    }

    /// Whether lookups are allowed.
    pub fn lookup_enabled(&self) -> bool {
        self.lookup_enabled
    }

    /// Put `value` into the declared slot `key`.
    pub fn put<T: Any + Send + Sync>(&mut self, key: &ProductKey, value: T) -> Result<(), ProcessingError> {
        let slot = self.slots.get_mut(key).ok_or_else(|| {
            ProcessingError::new(
                ErrorCategory::InsertFailure,
                format!("no product slot declared for '{key}'"),
            )
        })?;
        if slot.is_some() {
            return Err(ProcessingError::new(
                ErrorCategory::ProductRegistrationFailure,
                format!("product '{key}' was already put"),
            ));
        }
        *slot = Some(Box::new(value));
        Ok(())
    }

    /// Look up the product in slot `key`.
    pub fn get<T: Any>(&self, key: &ProductKey) -> Result<&T, ProcessingError> {
        let not_found = |why: &str| {
            ProcessingError::new(
                ErrorCategory::ProductNotFound,
                format!("product '{key}' {why}"),
            )
        };
        if !self.lookup_enabled {
            return Err(not_found("cannot be looked up yet"));
        }
        let value = self
            .slots
            .get(key)
            .and_then(|slot| slot.as_deref())
            .ok_or_else(|| not_found("was not found"))?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| not_found("has a different type"))
    }

    /// Whether slot `key` holds a product.
    pub fn contains(&self, key: &ProductKey) -> bool {
        matches!(self.slots.get(key), Some(Some(_)))
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for ProductStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductStore")
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("lookup_enabled", &self.lookup_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(key: &ProductKey) -> ProductStore {
        let mut store = ProductStore::default();
        store.create_groups([key]);
        store
    }

    #[test]
    fn put_then_get() {
        let key = ProductKey::new("tracker", "");
        let mut store = store_with(&key);
        store.put(&key, 42u32).unwrap();
        store.enable_lookup();
        assert_eq!(*store.get::<u32>(&key).unwrap(), 42);
    }

    #[test]
    fn lookup_disabled_until_enabled() {
        let key = ProductKey::new("tracker", "");
        let mut store = store_with(&key);
        store.put(&key, 1u32).unwrap();
        let err = store.get::<u32>(&key).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ProductNotFound);
    }

    #[test]
    fn undeclared_put_is_insert_failure() {
        let mut store = ProductStore::default();
        let err = store.put(&ProductKey::new("x", ""), 1u8).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InsertFailure);
    }

    #[test]
    fn second_put_is_registration_failure() {
        let key = ProductKey::new("tracker", "hits");
        let mut store = store_with(&key);
        store.put(&key, 1u8).unwrap();
        let err = store.put(&key, 2u8).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ProductRegistrationFailure);
    }

    #[test]
    fn tables_reject_duplicates() {
        let mut tables = ProductTables::new();
        assert!(tables.insert(ProductDescription::event("a", "")));
        assert!(!tables.insert(ProductDescription::event("a", "")));
        assert!(tables.insert(ProductDescription::run("a", "")));
        assert_eq!(tables.len(), 2);
    }
}
