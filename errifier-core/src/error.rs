//! Error types for errifier-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::EntryId;

/// Which unique field collided in [`AddError::Duplicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Path,
    Label,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::Path => write!(f, "path"),
            DuplicateField::Label => write!(f, "label"),
        }
    }
}

/// Rejections from `WatchRegistry::add_watch`. None of them leave a trace
/// in the registry.
#[derive(Debug, Error)]
pub enum AddError {
    /// Target is missing or is not a regular file.
    #[error("not a regular file: {path}")]
    InvalidFile { path: PathBuf },

    #[error("a label is required to tell watches apart")]
    MissingLabel,

    #[error("{field} '{value}' is already being watched")]
    Duplicate { field: DuplicateField, value: String },

    #[error("watch capacity of {capacity} reached")]
    CapacityExceeded { capacity: usize },

    #[error("event source error: {0}")]
    EventSource(#[from] EventSourceError),

    #[error("registry is shutting down")]
    ShuttingDown,
}

/// Errors for operations addressing an existing entry by id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToggleError {
    #[error("no watch with id {id}")]
    NotFound { id: EntryId },
}

/// Errors from the tail reader.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the filesystem event source, at open time or while reading.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("cannot watch {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("event read failed: {0}")]
    Read(String),
}

/// Configuration load and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
