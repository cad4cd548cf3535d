//! Per-entry watcher tasks.
//!
//! One task per watched file. The task suspends only on its [`EventStream`];
//! after every wake it re-reads the entry's state through a `Weak` handle to
//! the entry's [`EntryControl`], so a toggle is seen no later than the next
//! batch. Paused tasks keep draining their stream and drop what they read.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::sink::NotificationSink;
use crate::source::{EventSource, EventStream};
use crate::types::{ChangeEvent, ChangeKind, EntryId, Notification, WatchState};

/// Shared, synchronized part of an entry.
///
/// The registry owns the only strong reference. The control plane writes
/// `active`; the task writes the counters and `attached`.
#[derive(Debug)]
pub(crate) struct EntryControl {
    active: AtomicBool,
    attached: AtomicBool,
    events_seen: AtomicU64,
    events_discarded: AtomicU64,
    notifications_sent: AtomicU64,
}

impl EntryControl {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            attached: AtomicBool::new(true),
            events_seen: AtomicU64::new(0),
            events_discarded: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> WatchState {
        if self.active.load(Ordering::Acquire) {
            WatchState::Active
        } else {
            WatchState::Paused
        }
    }

    /// Flip the state and return the new one.
    pub(crate) fn toggle(&self) -> WatchState {
        let was_active = self.active.fetch_xor(true, Ordering::AcqRel);
        if was_active {
            WatchState::Paused
        } else {
            WatchState::Active
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    pub(crate) fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }

    pub(crate) fn events_discarded(&self) -> u64 {
        self.events_discarded.load(Ordering::Relaxed)
    }

    pub(crate) fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    fn record_event(&self) -> u64 {
        self.events_seen.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// What the loop should do after handling one wake.
enum Next {
    Wait,
    Reattach,
    Exit,
}

pub(crate) struct WatcherTask {
    pub(crate) id: EntryId,
    pub(crate) label: String,
    pub(crate) path: PathBuf,
    pub(crate) control: Weak<EntryControl>,
    pub(crate) stream: EventStream,
    pub(crate) source: Arc<dyn EventSource>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) cancel: CancellationToken,
    pub(crate) reopen_interval: Duration,
}

impl WatcherTask {
    pub(crate) async fn run(mut self) {
        tracing::debug!(entry = %self.id, label = %self.label, "watcher task started");
        let notification = Notification::for_label(&self.label);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.stream.next_batch() => next,
            };

            let step = match self.control.upgrade() {
                None => Next::Exit,
                Some(control) => match next {
                    Some(Ok(batch)) => self.handle_batch(&control, &batch, &notification),
                    Some(Err(err)) => {
                        tracing::warn!(
                            entry = %self.id,
                            label = %self.label,
                            error = %err,
                            "event source read failed; waiting again",
                        );
                        Next::Wait
                    }
                    None => {
                        tracing::warn!(entry = %self.id, label = %self.label, "event source closed");
                        Next::Reattach
                    }
                },
            };

            match step {
                Next::Wait => {}
                Next::Reattach => {
                    if !self.reattach().await {
                        break;
                    }
                }
                Next::Exit => break,
            }
        }

        tracing::debug!(entry = %self.id, label = %self.label, "watcher task stopped");
    }

    fn handle_batch(
        &self,
        control: &EntryControl,
        batch: &[ChangeEvent],
        notification: &Notification,
    ) -> Next {
        let detached = batch.iter().any(ChangeEvent::detaches);

        if !control.state().is_active() {
            control
                .events_discarded
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
            tracing::debug!(
                entry = %self.id,
                events = batch.len(),
                "watch paused; discarding batch",
            );
        } else {
            for event in batch {
                let seq = control.record_event();
                if event.kind == ChangeKind::Modified {
                    self.sink.notify(notification);
                    control.notifications_sent.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(entry = %self.id, seq, length = event.length, "notified");
                }
            }
        }

        if detached {
            Next::Reattach
        } else {
            Next::Wait
        }
    }

    /// Re-open the watched path until it succeeds. Returns false when the
    /// task should stop instead.
    async fn reattach(&mut self) -> bool {
        match self.control.upgrade() {
            Some(control) => control.set_attached(false),
            None => return false,
        }
        tracing::info!(
            entry = %self.id,
            path = %self.path.display(),
            "watched file went away; re-opening",
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.reopen_interval) => {}
            }

            let Some(control) = self.control.upgrade() else {
                return false;
            };
            match self.source.open(&self.path) {
                Ok(stream) => {
                    self.stream = stream;
                    control.set_attached(true);
                    tracing::info!(entry = %self.id, path = %self.path.display(), "watch re-attached");
                    return true;
                }
                Err(err) => {
                    tracing::debug!(entry = %self.id, error = %err, "re-open failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_starts_active_and_attached() {
        let control = EntryControl::new();
        assert_eq!(control.state(), WatchState::Active);
        assert!(control.is_attached());
        assert_eq!(control.events_seen(), 0);
    }

    #[test]
    fn toggle_returns_new_state() {
        let control = EntryControl::new();
        assert_eq!(control.toggle(), WatchState::Paused);
        assert_eq!(control.state(), WatchState::Paused);
        assert_eq!(control.toggle(), WatchState::Active);
    }

    #[test]
    fn concurrent_toggles_net_out() {
        let control = Arc::new(EntryControl::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let control = control.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        control.toggle();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert_eq!(control.state(), WatchState::Active);
    }

    #[test]
    fn record_event_is_monotonic() {
        let control = EntryControl::new();
        assert_eq!(control.record_event(), 1);
        assert_eq!(control.record_event(), 2);
        assert_eq!(control.events_seen(), 2);
    }
}
