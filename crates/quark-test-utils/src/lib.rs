//! Test utilities and mock collaborators for Quark development.
//!
//! Provides a scripted [`InputSource`](quark_core::InputSource), a
//! recording [`OutputModule`](quark_core::OutputModule), and a handful of
//! modules that produce, filter, fail, panic or record, so integration
//! tests can drive the event processor end to end.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod journal;
mod modules;
mod output;
mod source;

pub use journal::Journal;
pub use modules::{
    EventLog, EventNumberProducer, FailingModifier, FnModifier, PanickingModifier,
    RecordingObserver, RejectingFilter, TransitionRecorder,
};
pub use output::{OutputLog, RecordedFile, RecordingOutput};
pub use source::{ScriptItem, ScriptedSource};
