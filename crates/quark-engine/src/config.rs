//! Job configuration, validation, and error types.
//!
//! [`SchedulerConfig`] is plain data and can be deserialized from any serde
//! format. [`JobConfig`] bundles it with the collaborators the job runs:
//! the input source, the per-schedule module paths, the output modules and
//! the activity registry.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use quark_core::{ActionTable, ErrorAction, ErrorCategory, InputSource, OutputModule, ScheduleId};
use serde::Deserialize;

use crate::activity::ActivityRegistry;
use crate::output::FileClosingCriteria;
use crate::schedule::SchedulePaths;

/// Upper bound on the number of schedules.
pub const MAX_SCHEDULES: usize = 256;

// ── ErrorActionsConfig ─────────────────────────────────────────────

/// Error-category names grouped by the action to take.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorActionsConfig {
    /// Categories that end the job.
    pub rethrow: Vec<String>,
    /// Categories that skip the current event.
    pub skip_event: Vec<String>,
    /// Categories that fail the current path.
    pub fail_path: Vec<String>,
    /// Categories that treat the failing module as passed.
    pub fail_module: Vec<String>,
    /// Categories that are logged and otherwise ignored.
    pub ignore_completely: Vec<String>,
}

impl ErrorActionsConfig {
    /// Build the action table, rejecting unknown names and categories
    /// listed under two different actions.
    pub fn to_action_table(&self) -> Result<ActionTable, ConfigError> {
        let groups = [
            (ErrorAction::Rethrow, &self.rethrow),
            (ErrorAction::SkipEvent, &self.skip_event),
            (ErrorAction::FailPath, &self.fail_path),
            (ErrorAction::FailModule, &self.fail_module),
            (ErrorAction::IgnoreCompletely, &self.ignore_completely),
        ];
        let mut assigned: IndexMap<ErrorCategory, ErrorAction> = IndexMap::new();
        for (action, names) in groups {
            for name in names {
                let category =
                    ErrorCategory::from_name(name).ok_or_else(|| ConfigError::UnknownCategory {
                        name: name.clone(),
                        action,
                    })?;
                if let Some(first) = assigned.insert(category, action) {
                    if first != action {
                        return Err(ConfigError::ConflictingAction {
                            category,
                            first,
                            second: action,
                        });
                    }
                }
            }
        }
        let mut table = ActionTable::new();
        for (category, action) in assigned {
            table.insert(category, action);
        }
        Ok(table)
    }
}

// ── SchedulerConfig ────────────────────────────────────────────────

/// Scheduling and policy settings of a job.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Number of concurrent event lanes. Default: 1.
    pub num_schedules: usize,
    /// Threads in the task group, including the driving thread. `0` means
    /// auto-detect from available parallelism. Default: 1.
    pub num_threads: usize,
    /// Begin runs as soon as they are read, even if they hold no events.
    /// Default: true.
    pub handle_empty_runs: bool,
    /// Begin sub-runs as soon as they are read, even if they hold no
    /// events. Default: true.
    pub handle_empty_subruns: bool,
    /// Log a job summary at the end of the job. Default: false.
    pub want_summary: bool,
    /// Install a termination-signal listener. Default: true.
    pub enable_sig_int: bool,
    /// Error-action policy.
    pub error_actions: ErrorActionsConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_schedules: 1,
            num_threads: 1,
            handle_empty_runs: true,
            handle_empty_subruns: true,
            want_summary: false,
            enable_sig_int: true,
            error_actions: ErrorActionsConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Resolve the thread count, applying auto-detection for `0`.
    ///
    /// Explicit values are clamped to `[1, 256]`.
    pub fn resolved_thread_count(&self) -> usize {
        match self.num_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, 64),
            n => n.clamp(1, 256),
        }
    }

    /// Check scheduler invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_schedules == 0 {
            return Err(ConfigError::NoSchedules);
        }
        if self.num_schedules > MAX_SCHEDULES {
            return Err(ConfigError::TooManySchedules {
                configured: self.num_schedules,
                max: MAX_SCHEDULES,
            });
        }
        self.error_actions.to_action_table()?;
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a job configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `num_schedules` is zero.
    #[error("num_schedules must be at least 1")]
    NoSchedules,
    /// `num_schedules` is above [`MAX_SCHEDULES`].
    #[error("num_schedules {configured} exceeds maximum of {max}")]
    TooManySchedules {
        /// The configured count.
        configured: usize,
        /// The maximum.
        max: usize,
    },
    /// An error-action list names an unknown category.
    #[error("unknown error category '{name}' listed under {action}")]
    UnknownCategory {
        /// The unknown name.
        name: String,
        /// The list it appeared in.
        action: ErrorAction,
    },
    /// A category is listed under two different actions.
    #[error("error category {category} listed under both {first} and {second}")]
    ConflictingAction {
        /// The category.
        category: ErrorCategory,
        /// The first action.
        first: ErrorAction,
        /// The conflicting action.
        second: ErrorAction,
    },
    /// Two output modules share a label.
    #[error("duplicate output module label '{label}'")]
    DuplicateOutputLabel {
        /// The duplicated label.
        label: String,
    },
    /// Two trigger paths of a schedule share a name.
    #[error("duplicate trigger path name '{name}'")]
    DuplicatePath {
        /// The duplicated name.
        name: String,
    },
    /// A schedule's paths differ from the primary schedule's.
    #[error("schedule {schedule} has a different path layout than schedule 0")]
    InconsistentPaths {
        /// The offending schedule.
        schedule: ScheduleId,
    },
    /// A product is declared twice.
    #[error("product '{product}' declared more than once")]
    DuplicateProduct {
        /// The product key.
        product: String,
    },
    /// A background thread could not be spawned.
    #[error("thread spawn failed: {reason}")]
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

// ── JobConfig ──────────────────────────────────────────────────────

/// Builds the modules of one schedule. Called once per schedule.
pub type PathFactory = Box<dyn Fn(ScheduleId) -> SchedulePaths + Send + Sync>;

/// An output module with its file-closing criteria.
pub struct OutputSpec {
    /// The module.
    pub module: Box<dyn OutputModule>,
    /// When its files close.
    pub criteria: FileClosingCriteria,
}

impl OutputSpec {
    /// An output whose single file stays open for the whole job.
    pub fn new(module: impl OutputModule + 'static) -> Self {
        Self {
            module: Box::new(module),
            criteria: FileClosingCriteria::default(),
        }
    }

    /// Builder-style criteria override.
    pub fn with_criteria(mut self, criteria: FileClosingCriteria) -> Self {
        self.criteria = criteria;
        self
    }
}

/// Complete configuration for constructing an
/// [`EventProcessor`](crate::EventProcessor).
pub struct JobConfig {
    /// Scheduling and policy settings.
    pub scheduler: SchedulerConfig,
    /// The input source.
    pub source: Box<dyn InputSource>,
    /// Builds trigger paths and observers for each schedule.
    pub paths: PathFactory,
    /// Output modules, shared by all schedules.
    pub outputs: Vec<OutputSpec>,
    /// Lifecycle hooks.
    pub activity: ActivityRegistry,
}

impl JobConfig {
    /// Configuration with default scheduling, no modules, no outputs and
    /// no hooks.
    pub fn new(source: impl InputSource + 'static) -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            source: Box::new(source),
            paths: Box::new(|_| SchedulePaths::default()),
            outputs: Vec::new(),
            activity: ActivityRegistry::default(),
        }
    }

    /// Validate all structural invariants that do not require building
    /// the schedules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        let mut labels = IndexSet::new();
        for output in &self.outputs {
            let label = output.module.label();
            if !labels.insert(label) {
                return Err(ConfigError::DuplicateOutputLabel {
                    label: label.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("scheduler", &self.scheduler)
            .field("source", &self.source.label())
            .field(
                "outputs",
                &self.outputs.iter().map(|o| o.module.label()).collect::<Vec<_>>(),
            )
            .field("activity", &self.activity)
            .finish_non_exhaustive()
    }
}
