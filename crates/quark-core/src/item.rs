//! Item types announced by an input source, and input-file descriptors.

use std::fmt;

/// The kind of the next record an input source will deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// No more input.
    Stop,
    /// A new input file.
    File,
    /// A run record.
    Run,
    /// A sub-run record.
    SubRun,
    /// An event record.
    Event,
    /// The source is in an inconsistent state.
    Invalid,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stop => "Stop",
            Self::File => "File",
            Self::Run => "Run",
            Self::SubRun => "SubRun",
            Self::Event => "Event",
            Self::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// Describes an opened input file.
///
/// Output modules receive the current block when they open a new file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileBlock {
    file_name: String,
}

impl FileBlock {
    /// Describe the input file named `file_name`.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Name of the input file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for FileBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}
