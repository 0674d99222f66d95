//! Quark: a concurrent event-processing framework for hierarchical data.
//!
//! This is the facade crate that re-exports the public API of the Quark
//! sub-crates. Most users only need `quark` as a dependency.
//!
//! # Quick start
//!
//! ```rust
//! use quark::prelude::*;
//!
//! // One run holding one sub-run of three events.
//! struct Counter {
//!     items: Vec<ItemType>,
//!     event: u32,
//! }
//!
//! impl InputSource for Counter {
//!     fn next_item_type(&mut self) -> Result<ItemType, ProcessingError> {
//!         Ok(self.items.pop().unwrap_or(ItemType::Stop))
//!     }
//!     fn read_file(&mut self) -> Result<Option<FileBlock>, ProcessingError> {
//!         Ok(Some(FileBlock::new("input.root")))
//!     }
//!     fn read_run(&mut self) -> Result<RunPrincipal, ProcessingError> {
//!         Ok(RunPrincipal::new(RunId::new(1)))
//!     }
//!     fn read_subrun(&mut self, run: &RunPrincipal) -> Result<SubRunPrincipal, ProcessingError> {
//!         Ok(SubRunPrincipal::new(SubRunId::new(run.id().run(), 0)))
//!     }
//!     fn read_event(&mut self, sr: &SubRunPrincipal) -> Result<EventPrincipal, ProcessingError> {
//!         self.event += 1;
//!         Ok(EventPrincipal::new(EventId::new(1, sr.id().subrun(), self.event)))
//!     }
//!     fn run_range_set_handler(&self) -> RangeSetHandler {
//!         RangeSetHandler::open(RunId::new(1))
//!     }
//!     fn subrun_range_set_handler(&self) -> RangeSetHandler {
//!         RangeSetHandler::open(RunId::new(1))
//!     }
//! }
//!
//! let mut items = vec![ItemType::File, ItemType::Run, ItemType::SubRun];
//! items.extend([ItemType::Event; 3]);
//! items.reverse();
//!
//! let mut config = JobConfig::new(Counter { items, event: 0 });
//! config.scheduler.enable_sig_int = false;
//! let mut processor = EventProcessor::new(config).unwrap();
//! assert_eq!(processor.run_to_completion().unwrap(), StatusCode::Success);
//! assert_eq!(processor.summary().events_read, 3);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `quark-core` | Levels, identifiers, principals, range sets, errors, collaborator traits |
//! | [`engine`] | `quark-engine` | Event processor, schedules, outputs, task group, configuration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and traits (`quark-core`).
///
/// Contains the data hierarchy, identifiers, principals, event range sets,
/// the error taxonomy and the contracts for [`types::InputSource`],
/// [`types::Modifier`], [`types::Observer`] and [`types::OutputModule`].
pub use quark_core as types;

/// Execution core (`quark-engine`).
///
/// [`engine::EventProcessor`] drives a job; [`engine::JobConfig`]
/// describes it.
pub use quark_engine as engine;

/// Common imports for typical Quark usage.
///
/// ```rust
/// use quark::prelude::*;
/// ```
pub mod prelude {
    // Identifiers and principals
    pub use quark_core::{
        EventId, EventPrincipal, FileBlock, ItemType, RunId, RunPrincipal, ScheduleId, SubRunId,
        SubRunPrincipal,
    };

    // Ranges
    pub use quark_core::{EventRange, RangeSet, RangeSetHandler};

    // Errors and policy
    pub use quark_core::{ErrorAction, ErrorCategory, Failure, ProcessingError};

    // Collaborators
    pub use quark_core::{InputSource, Modifier, Observer, OutputModule, ProductDescription};

    // Engine
    pub use quark_engine::{
        ActivityRegistry, EventProcessor, FileClosingCriteria, JobConfig, OutputSpec,
        SchedulePaths, SchedulerConfig, StatusCode, TriggerPath,
    };
}
