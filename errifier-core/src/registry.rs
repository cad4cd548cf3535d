//! The watch registry.
//!
//! Single source of truth for what is watched and in which state. Entries are
//! addressed by [`EntryId`], their creation index, which never shifts: a
//! removed entry leaves a tombstone behind.
//!
//! # Locking
//!
//! - `entries` (`parking_lot::RwLock`) is held only for short, non-suspending
//!   sections. `toggle` and `describe` never wait on anything else.
//! - `admission` (async mutex) serializes `add_watch` so its checks and the
//!   append act as one step, and lets `shutdown` wait for an in-flight add.
//! - Each entry's Active/Paused flag lives in an atomic shared with its task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WatchConfig;
use crate::error::{AddError, DuplicateField, ToggleError};
use crate::sink::NotificationSink;
use crate::source::EventSource;
use crate::types::{EntryId, WatchSnapshot, WatchState};
use crate::watcher::{EntryControl, WatcherTask};

struct WatchEntry {
    path: PathBuf,
    label: String,
    added_at: DateTime<Utc>,
    control: Arc<EntryControl>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchEntry {
    fn snapshot(&self, id: EntryId) -> WatchSnapshot {
        WatchSnapshot {
            id,
            path: self.path.clone(),
            label: self.label.clone(),
            state: self.control.state(),
            attached: self.control.is_attached(),
            events_seen: self.control.events_seen(),
            events_discarded: self.control.events_discarded(),
            notifications_sent: self.control.notifications_sent(),
            added_at: self.added_at,
        }
    }
}

enum Slot {
    Live(WatchEntry),
    Removed,
}

impl Slot {
    fn live(&self) -> Option<&WatchEntry> {
        match self {
            Slot::Live(entry) => Some(entry),
            Slot::Removed => None,
        }
    }
}

pub struct WatchRegistry {
    capacity: usize,
    reopen_interval: Duration,
    source: Arc<dyn EventSource>,
    sink: Arc<dyn NotificationSink>,
    entries: RwLock<Vec<Slot>>,
    admission: Mutex<()>,
    shutdown: CancellationToken,
}

impl WatchRegistry {
    pub fn new(
        config: &WatchConfig,
        source: Arc<dyn EventSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            capacity: config.capacity,
            reopen_interval: config.reopen_interval(),
            source,
            sink,
            entries: RwLock::new(Vec::new()),
            admission: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().iter().filter_map(Slot::live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Register `path` under `label` and start its watcher task.
    ///
    /// Checks run in order and short-circuit: regular file, non-empty label,
    /// unique path, unique label, capacity. Nothing is allocated until all of
    /// them pass; a failure leaves the registry untouched.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn add_watch(
        &self,
        path: impl AsRef<Path>,
        label: &str,
    ) -> Result<EntryId, AddError> {
        let _admission = self.admission.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(AddError::ShuttingDown);
        }

        let path = regular_file(path.as_ref())?;
        let label = label.trim();
        if label.is_empty() {
            return Err(AddError::MissingLabel);
        }
        self.check_admission(&path, label)?;

        let stream = self.source.open(&path)?;
        let control = Arc::new(EntryControl::new());
        let cancel = self.shutdown.child_token();

        let mut entries = self.entries.write();
        let id = EntryId(entries.len());
        let task = WatcherTask {
            id,
            label: label.to_owned(),
            path: path.clone(),
            control: Arc::downgrade(&control),
            stream,
            source: self.source.clone(),
            sink: self.sink.clone(),
            cancel: cancel.clone(),
            reopen_interval: self.reopen_interval,
        };
        let handle = tokio::spawn(task.run());

        entries.push(Slot::Live(WatchEntry {
            path: path.clone(),
            label: label.to_owned(),
            added_at: Utc::now(),
            control,
            cancel,
            task: Some(handle),
        }));

        tracing::info!(entry = %id, label = %label, path = %path.display(), "watch added");
        Ok(id)
    }

    fn check_admission(&self, path: &Path, label: &str) -> Result<(), AddError> {
        let entries = self.entries.read();
        let live = || entries.iter().filter_map(Slot::live);

        if live().any(|entry| entry.path == path) {
            return Err(AddError::Duplicate {
                field: DuplicateField::Path,
                value: path.display().to_string(),
            });
        }
        if live().any(|entry| entry.label == label) {
            return Err(AddError::Duplicate {
                field: DuplicateField::Label,
                value: label.to_owned(),
            });
        }
        if live().count() >= self.capacity {
            return Err(AddError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Flip an entry between Active and Paused and return the new state.
    ///
    /// The task observes the change on its next wake.
    pub fn toggle(&self, id: EntryId) -> Result<WatchState, ToggleError> {
        let entries = self.entries.read();
        let entry = live_entry(&entries, id)?;
        let state = entry.control.toggle();
        tracing::info!(entry = %id, label = %entry.label, state = %state, "watch toggled");
        Ok(state)
    }

    /// Snapshot of every live entry, in creation order.
    pub fn describe(&self) -> Vec<WatchSnapshot> {
        self.entries
            .read()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.live().map(|entry| entry.snapshot(EntryId(index))))
            .collect()
    }

    pub fn get(&self, id: EntryId) -> Result<WatchSnapshot, ToggleError> {
        let entries = self.entries.read();
        live_entry(&entries, id).map(|entry| entry.snapshot(id))
    }

    /// Stop an entry's task and forget the entry. Its path and label become
    /// available again; other ids are unaffected.
    pub async fn remove(&self, id: EntryId) -> Result<WatchSnapshot, ToggleError> {
        let mut entry = {
            let mut entries = self.entries.write();
            let slot = entries
                .get_mut(id.0)
                .ok_or(ToggleError::NotFound { id })?;
            match std::mem::replace(slot, Slot::Removed) {
                Slot::Live(entry) => entry,
                Slot::Removed => return Err(ToggleError::NotFound { id }),
            }
        };

        entry.cancel.cancel();
        if let Some(task) = entry.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(entry = %id, error = %err, "watcher task ended abnormally");
            }
        }

        tracing::info!(entry = %id, label = %entry.label, "watch removed");
        Ok(entry.snapshot(id))
    }

    /// Cancel every watcher task and wait for all of them. Idempotent.
    pub async fn shutdown(&self) {
        let _admission = self.admission.lock().await;
        self.shutdown.cancel();

        let tasks: Vec<(EntryId, JoinHandle<()>)> = {
            let mut entries = self.entries.write();
            entries
                .iter_mut()
                .enumerate()
                .filter_map(|(index, slot)| match slot {
                    Slot::Live(entry) => entry.task.take().map(|task| (EntryId(index), task)),
                    Slot::Removed => None,
                })
                .collect()
        };

        let count = tasks.len();
        for (id, task) in tasks {
            if let Err(err) = task.await {
                tracing::warn!(entry = %id, error = %err, "watcher task ended abnormally");
            }
        }
        if count > 0 {
            tracing::info!(tasks = count, "watch registry shut down");
        }
    }
}

impl Drop for WatchRegistry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn live_entry(entries: &[Slot], id: EntryId) -> Result<&WatchEntry, ToggleError> {
    entries
        .get(id.0)
        .and_then(Slot::live)
        .ok_or(ToggleError::NotFound { id })
}

/// Resolve `path` to its canonical absolute form if it names a regular file.
fn regular_file(path: &Path) -> Result<PathBuf, AddError> {
    let invalid = || AddError::InvalidFile {
        path: path.to_path_buf(),
    };
    let meta = std::fs::metadata(path).map_err(|_| invalid())?;
    if !meta.is_file() {
        return Err(invalid());
    }
    std::fs::canonicalize(path).map_err(|_| invalid())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
