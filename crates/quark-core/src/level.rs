//! The processing hierarchy and output-closure granularities.

use std::fmt;

/// A level of the processing hierarchy, ordered from least to most nested.
///
/// `Job` is the highest level and doubles as the "stop" marker when it is
/// the next level announced by the input source. A level that compares
/// *less* than the current one is a pop-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    /// The whole job.
    Job,
    /// One input file.
    InputFile,
    /// A run.
    Run,
    /// A sub-run.
    SubRun,
    /// A single event.
    Event,
}

impl Level {
    /// The least nested level.
    pub const fn highest() -> Self {
        Self::Job
    }

    /// The most nested level.
    pub const fn most_deeply_nested() -> Self {
        Self::Event
    }

    /// The next more nested level, if any.
    pub const fn level_down(self) -> Option<Self> {
        match self {
            Self::Job => Some(Self::InputFile),
            Self::InputFile => Some(Self::Run),
            Self::Run => Some(Self::SubRun),
            Self::SubRun => Some(Self::Event),
            Self::Event => None,
        }
    }

    /// The next less nested level, if any.
    pub const fn level_up(self) -> Option<Self> {
        match self {
            Self::Job => None,
            Self::InputFile => Some(Self::Job),
            Self::Run => Some(Self::InputFile),
            Self::SubRun => Some(Self::Run),
            Self::Event => Some(Self::SubRun),
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Job => "Job",
            Self::InputFile => "InputFile",
            Self::Run => "Run",
            Self::SubRun => "SubRun",
            Self::Event => "Event",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Boundary at which an output file may be closed.
///
/// Ordered from finest to coarsest: a file with granularity `Run` may be
/// closed at run, input-file and job boundaries but never between events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    /// Between events.
    Event,
    /// At a sub-run boundary.
    SubRun,
    /// At a run boundary.
    Run,
    /// At an input-file boundary.
    InputFile,
    /// Only at the end of the job.
    Job,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Event => "Event",
            Self::SubRun => "SubRun",
            Self::Run => "Run",
            Self::InputFile => "InputFile",
            Self::Job => "Job",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_order() {
        assert!(Level::Job < Level::InputFile);
        assert!(Level::SubRun < Level::Event);
        assert_eq!(Level::highest(), Level::Job);
        assert_eq!(Level::most_deeply_nested(), Level::Event);
    }

    #[test]
    fn level_down_and_up_are_inverse() {
        let mut level = Level::highest();
        while let Some(child) = level.level_down() {
            assert_eq!(child.level_up(), Some(level));
            level = child;
        }
        assert_eq!(level, Level::Event);
    }

    #[test]
    fn granularity_is_finest_first() {
        assert!(Granularity::Event < Granularity::SubRun);
        assert!(Granularity::InputFile < Granularity::Job);
    }
}
