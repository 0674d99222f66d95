//! Failure capture: the cross-lane exception store and the sequential
//! exception collector used by the level machine.

use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;
use quark_core::Failure;
use tracing::{debug, error};

/// Holds at most one failure raised by a concurrently running lane.
///
/// The first stored failure wins; later ones are logged and discarded.
/// The driver drains the store once per burst.
#[derive(Debug, Default)]
pub struct SharedException {
    slot: Mutex<Option<Failure>>,
}

impl SharedException {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `failure` unless one is already stored.
    pub fn store(&self, failure: Failure) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(failure);
        } else {
            debug!(%failure, "discarding failure, another one is already stored");
        }
    }

    /// Whether no failure is stored.
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Remove and return the stored failure.
    pub fn take(&self) -> Option<Failure> {
        self.slot.lock().take()
    }

    /// Return the stored failure as an error, emptying the store.
    pub fn throw_if_stored(&self) -> Result<(), Failure> {
        match self.take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Runs steps in sequence, remembering the first failure.
///
/// Steps keep running after a failure so that cleanup still happens;
/// callers consult [`is_empty`](Self::is_empty) to skip optional work.
#[derive(Debug, Default)]
pub(crate) struct ExceptionCollector {
    first: Option<Failure>,
    suppressed: usize,
}

impl ExceptionCollector {
    pub(crate) fn collect(&mut self, result: Result<(), Failure>) {
        let Err(failure) = result else {
            return;
        };
        if self.first.is_none() {
            self.first = Some(failure);
        } else {
            self.suppressed += 1;
            error!(%failure, "additional failure while handling an earlier one");
        }
    }

    /// Run `step`, converting a panic into an unknown failure.
    pub(crate) fn call(&mut self, what: &str, step: impl FnOnce() -> Result<(), Failure>) {
        let result = catch_unwind(AssertUnwindSafe(step))
            .unwrap_or_else(|payload| Err(Failure::from_panic(what, payload)));
        self.collect(result);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub(crate) fn take(&mut self) -> Option<Failure> {
        if self.suppressed > 0 {
            debug!(suppressed = self.suppressed, "reporting first of several failures");
            self.suppressed = 0;
        }
        self.first.take()
    }

    pub(crate) fn into_result(mut self) -> Result<(), Failure> {
        match self.take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Run `f`, converting a panic into an unknown failure attributed to `what`.
pub(crate) fn guarded<T>(what: &str, f: impl FnOnce() -> T) -> Result<T, Failure> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Failure::from_panic(what, payload))
}
