//! Domain types for the watch registry.
//!
//! All path fields use `PathBuf`; labels are plain strings validated by the
//! registry. Snapshot types are serializable so the daemon can ship them over
//! its socket unchanged.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identity of a watch: its creation index in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<usize> for EntryId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether an entry's task forwards change events as notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchState {
    #[default]
    Active,
    Paused,
}

impl WatchState {
    pub fn toggled(self) -> Self {
        match self {
            WatchState::Active => WatchState::Paused,
            WatchState::Paused => WatchState::Active,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, WatchState::Active)
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchState::Active => write!(f, "Active"),
            WatchState::Paused => write!(f, "Paused"),
        }
    }
}

/// Kind of a raw change record reported by an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// File content was written.
    Modified,
    Metadata,
    /// The watched path was unlinked.
    Removed,
    /// The watched path was moved away (typical log rotation).
    Renamed,
    Other,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One raw change record for a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// File length observed when the record was produced; 0 when unknown.
    pub length: u64,
}

impl ChangeEvent {
    pub fn modified(length: u64) -> Self {
        Self {
            kind: ChangeKind::Modified,
            length,
        }
    }

    pub fn of_kind(kind: ChangeKind) -> Self {
        Self { kind, length: 0 }
    }

    /// True when the handle behind this record no longer follows the path.
    pub fn detaches(&self) -> bool {
        matches!(self.kind, ChangeKind::Removed | ChangeKind::Renamed)
    }
}

/// A human-visible alert handed to a [`crate::sink::NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    /// The alert raised when the file labelled `label` is modified.
    pub fn for_label(label: &str) -> Self {
        Self {
            title: label.to_owned(),
            message: format!("There is error in {label}. Please check your logs"),
        }
    }
}

/// Read-only view of one registry entry, as returned by `describe()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSnapshot {
    pub id: EntryId,
    /// Canonical absolute path of the watched file.
    pub path: PathBuf,
    pub label: String,
    pub state: WatchState,
    /// False while the task is trying to re-open a deleted or rotated file.
    pub attached: bool,
    pub events_seen: u64,
    /// Records dropped while the entry was paused.
    pub events_discarded: u64,
    pub notifications_sent: u64,
    pub added_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
