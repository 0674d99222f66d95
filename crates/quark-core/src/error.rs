//! Error taxonomy for event processing.
//!
//! Every failure raised by a source, module or output module is a
//! [`ProcessingError`] tagged with an [`ErrorCategory`]. The error-action
//! policy looks at the *root* category of the cause chain, so wrapping a
//! failure with framework context never changes how it is handled.
//! Anything that is not a classified failure (a panic in user code) is a
//! [`Failure::Unknown`].

use std::any::Any;
use std::error::Error;
use std::fmt;

// ── ErrorCategory ──────────────────────────────────────────────────

/// Classification of a processing failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// Invalid or inconsistent configuration.
    Configuration,
    /// An internal invariant of the framework or a collaborator was broken.
    LogicError,
    /// A product lookup found nothing.
    ProductNotFound,
    /// A product was registered or put twice.
    ProductRegistrationFailure,
    /// A product could not be inserted into a principal.
    InsertFailure,
    /// A file could not be opened.
    FileOpenError,
    /// A file could not be read.
    FileReadError,
    /// A file could not be written.
    FileWriteError,
    /// A file could not be closed.
    FileCloseError,
    /// Input data failed a consistency check.
    DataCorruption,
    /// Wrapper raised by the event processor around a failure in event processing.
    EventProcessorFailure,
    /// Wrapper raised by a schedule around a failing module.
    ScheduleExecutionFailure,
    /// Any other classified failure.
    Other,
    /// Unclassified failure.
    Unknown,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [ErrorCategory; 14] = [
        Self::Configuration,
        Self::LogicError,
        Self::ProductNotFound,
        Self::ProductRegistrationFailure,
        Self::InsertFailure,
        Self::FileOpenError,
        Self::FileReadError,
        Self::FileWriteError,
        Self::FileCloseError,
        Self::DataCorruption,
        Self::EventProcessorFailure,
        Self::ScheduleExecutionFailure,
        Self::Other,
        Self::Unknown,
    ];

    /// Stable name, as used in configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Configuration => "Configuration",
            Self::LogicError => "LogicError",
            Self::ProductNotFound => "ProductNotFound",
            Self::ProductRegistrationFailure => "ProductRegistrationFailure",
            Self::InsertFailure => "InsertFailure",
            Self::FileOpenError => "FileOpenError",
            Self::FileReadError => "FileReadError",
            Self::FileWriteError => "FileWriteError",
            Self::FileCloseError => "FileCloseError",
            Self::DataCorruption => "DataCorruption",
            Self::EventProcessorFailure => "EventProcessorFailure",
            Self::ScheduleExecutionFailure => "ScheduleExecutionFailure",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }

    /// Look a category up by its stable name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── ProcessingError ────────────────────────────────────────────────

/// A classified failure with an optional cause chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingError {
    category: ErrorCategory,
    message: String,
    context: Vec<String>,
    cause: Option<Box<ProcessingError>>,
}

impl ProcessingError {
    /// Create a failure of `category`.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: Vec::new(),
            cause: None,
        }
    }

    /// Shorthand for a [`ErrorCategory::LogicError`].
    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::LogicError, message)
    }

    /// Wrap `cause` in a new failure of `category`.
    pub fn wrap(category: ErrorCategory, message: impl Into<String>, cause: ProcessingError) -> Self {
        Self {
            cause: Some(Box::new(cause)),
            ..Self::new(category, message)
        }
    }

    /// Append a line of context, keeping the category.
    pub fn with_context(mut self, line: impl Into<String>) -> Self {
        self.context.push(line.into());
        self
    }

    /// The category of this failure.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// The category at the bottom of the cause chain.
    pub fn root_category(&self) -> ErrorCategory {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current.category
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Context lines added with [`with_context`](Self::with_context).
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// The wrapped failure, if any.
    pub fn cause(&self) -> Option<&ProcessingError> {
        self.cause.as_deref()
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)?;
        for line in &self.context {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

impl Error for ProcessingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}

// ── Failure ────────────────────────────────────────────────────────

/// Anything that can stop the processing of an event or a job.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// A classified failure.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    /// A failure without a category, typically a panic in user code.
    #[error("unknown failure: {0}")]
    Unknown(String),
}

impl Failure {
    /// Convert a caught panic payload raised while running `what`.
    pub fn from_panic(what: &str, payload: Box<dyn Any + Send>) -> Self {
        Self::Unknown(format!("{what} panicked: {}", panic_message(payload.as_ref())))
    }

    /// Root category used for error-action classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Processing(e) => e.root_category(),
            Self::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    /// The classified failure, if this is one.
    pub fn as_processing(&self) -> Option<&ProcessingError> {
        match self {
            Self::Processing(e) => Some(e),
            Self::Unknown(_) => None,
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
