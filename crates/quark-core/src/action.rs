//! Error-action policy: what to do when a failure of a given category
//! escapes a module.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{ErrorCategory, ProcessingError};

/// Action taken for a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorAction {
    /// Propagate the failure and end the job.
    Rethrow,
    /// Abandon the current event and continue with the next.
    SkipEvent,
    /// Treat the failing module as if it passed.
    FailModule,
    /// Mark the current path as failed and continue with the next path.
    FailPath,
    /// Log and carry on as if nothing happened.
    IgnoreCompletely,
}

impl ErrorAction {
    /// Stable name, as used in configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rethrow => "rethrow",
            Self::SkipEvent => "skip_event",
            Self::FailModule => "fail_module",
            Self::FailPath => "fail_path",
            Self::IgnoreCompletely => "ignore_completely",
        }
    }
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping from error category to action. Unlisted categories rethrow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionTable {
    actions: IndexMap<ErrorCategory, ErrorAction>,
}

impl ActionTable {
    /// An empty table: everything rethrows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, category: ErrorCategory, action: ErrorAction) -> Self {
        self.insert(category, action);
        self
    }

    /// Set the action for `category`, returning the previous one.
    pub fn insert(&mut self, category: ErrorCategory, action: ErrorAction) -> Option<ErrorAction> {
        self.actions.insert(category, action)
    }

    /// The action for `category`.
    pub fn action(&self, category: ErrorCategory) -> ErrorAction {
        self.actions
            .get(&category)
            .copied()
            .unwrap_or(ErrorAction::Rethrow)
    }

    /// The action for a failure, classified by its root category.
    pub fn classify(&self, error: &ProcessingError) -> ErrorAction {
        self.action(error.root_category())
    }

    /// Number of explicitly configured categories.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no category is explicitly configured.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
