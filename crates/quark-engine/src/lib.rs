//! Execution core of the Quark event-processing framework.
//!
//! [`EventProcessor`] walks the data hierarchy delivered by an input source
//! (job, input file, run, sub-run, event), runs begin/end transitions on
//! every schedule, and pumps events through the schedules concurrently on
//! a [`TaskGroup`]. Output-file switches and the reconciliation of event
//! range sets across schedules are coordinated at quiescent points.
//!
//! | Module | Contents |
//! |---|---|
//! | [`processor`] | Level state machine and output-file switch protocol |
//! | [`schedule`] | Per-lane module execution and range-set bookkeeping |
//! | [`output`] | Output modules shared by all schedules |
//! | [`task`] | Task-parallel engine |
//! | [`config`] | Job and scheduler configuration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod activity;
pub mod config;
pub mod exception;
pub mod logging;
pub mod output;
pub mod processor;
mod pump;
pub mod schedule;
pub mod shutdown;
pub mod summary;
pub mod task;

pub use activity::{ActivityRegistry, Signal};
pub use config::{ConfigError, ErrorActionsConfig, JobConfig, OutputSpec, SchedulerConfig};
pub use exception::SharedException;
pub use output::{FileClosingCriteria, OutputFileStatus, OutputHub};
pub use processor::{EventProcessor, StatusCode};
pub use schedule::{PathStatus, SchedulePaths, TriggerPath, TriggerResults};
pub use shutdown::{ShutdownFlag, SignalListener};
pub use summary::{JobSummary, PathSummary};
pub use task::{TaskGroup, TaskPanic, TaskSpawner};
