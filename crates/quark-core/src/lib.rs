//! Core types and traits for the Quark event-processing framework.
//!
//! This is the leaf crate with no internal Quark dependencies. It defines
//! the data hierarchy (job, input file, run, sub-run, event), the
//! identifiers and principals that carry it, event range sets, the error
//! taxonomy and error-action policy, and the contracts implemented by
//! input sources, modules and output modules.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod error;
pub mod id;
pub mod item;
pub mod level;
pub mod principal;
pub mod product;
pub mod range;
pub mod range_handler;
pub mod traits;

pub use action::{ActionTable, ErrorAction};
pub use error::{ErrorCategory, Failure, ProcessingError};
pub use id::{EventId, RunId, ScheduleId, SubRunId};
pub use item::{FileBlock, ItemType};
pub use level::{Granularity, Level};
pub use principal::{EventPrincipal, Principal, PrincipalId, RunPrincipal, SubRunPrincipal};
pub use product::{BranchType, ProductDescription, ProductKey, ProductStore, ProductTables};
pub use range::{EventRange, RangeError, RangeSet};
pub use range_handler::{
    ClosedRangeSetHandler, EventInfo, HandlerKind, OpenRangeSetHandler, RangeSetHandler,
};
pub use traits::{InputSource, Modifier, Observer, OutputModule, Transition};
