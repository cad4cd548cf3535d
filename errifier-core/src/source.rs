//! Filesystem event sources.
//!
//! An [`EventSource`] opens one [`EventStream`] per watched file. The stream
//! is the only thing a watcher task ever suspends on: [`EventStream::next_batch`]
//! waits for the first record, then drains whatever else is already queued,
//! the same way one `read()` on an inotify descriptor returns several events.
//!
//! [`NotifyEventSource`] is the production backend. Tests and embedders can
//! drive a stream by hand through [`EventStream::channel`].

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::EventSourceError;
use crate::types::{ChangeEvent, ChangeKind};

type Record = Result<ChangeEvent, EventSourceError>;

/// Opens change-event streams for individual files.
pub trait EventSource: Send + Sync + 'static {
    fn open(&self, path: &Path) -> Result<EventStream, EventSourceError>;
}

/// Single-consumer stream of change records for one file.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Record>,
    pending_error: Option<EventSourceError>,
    // Keeps the OS-level watch registered for as long as the stream lives.
    _guard: Option<Box<dyn Send>>,
}

impl EventStream {
    /// A stream fed by hand through the returned [`EventFeed`].
    pub fn channel() -> (EventFeed, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventFeed { tx }, Self::from_receiver(rx, None))
    }

    fn from_receiver(rx: mpsc::UnboundedReceiver<Record>, guard: Option<Box<dyn Send>>) -> Self {
        Self {
            rx,
            pending_error: None,
            _guard: guard,
        }
    }

    /// Wait for the next batch of records.
    ///
    /// Returns `None` once every producer is gone. An error record ends the
    /// batch in progress and is returned by the following call.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<ChangeEvent>, EventSourceError>> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }

        let first = match self.rx.recv().await? {
            Ok(event) => event,
            Err(err) => return Some(Err(err)),
        };

        let mut batch = vec![first];
        while let Ok(record) = self.rx.try_recv() {
            match record {
                Ok(event) => batch.push(event),
                Err(err) => {
                    self.pending_error = Some(err);
                    break;
                }
            }
        }
        Some(Ok(batch))
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("pending_error", &self.pending_error)
            .finish_non_exhaustive()
    }
}

/// Producer half of a hand-driven [`EventStream`].
#[derive(Debug, Clone)]
pub struct EventFeed {
    tx: mpsc::UnboundedSender<Record>,
}

impl EventFeed {
    /// Queue a record. Returns false once the stream has been dropped.
    pub fn push(&self, event: ChangeEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    pub fn fail(&self, err: EventSourceError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// notify backend
// ---------------------------------------------------------------------------

/// Event source backed by the platform watcher from the `notify` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyEventSource;

impl NotifyEventSource {
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for NotifyEventSource {
    fn open(&self, path: &Path) -> Result<EventStream, EventSourceError> {
        let (tx, rx) = mpsc::unbounded_channel::<Record>();
        let watched: PathBuf = path.to_path_buf();
        let callback_path = watched.clone();

        let mut watcher: RecommendedWatcher =
            recommended_watcher(move |result: notify::Result<Event>| {
                let record = match result {
                    Ok(event) => Ok(to_change_event(&event, &callback_path)),
                    Err(err) => Err(EventSourceError::Read(err.to_string())),
                };
                let _ = tx.send(record);
            })
            .map_err(|source| EventSourceError::Open {
                path: watched.clone(),
                source,
            })?;

        watcher
            .watch(&watched, RecursiveMode::NonRecursive)
            .map_err(|source| EventSourceError::Open {
                path: watched.clone(),
                source,
            })?;

        tracing::debug!(path = %watched.display(), "event source opened");
        Ok(EventStream::from_receiver(rx, Some(Box::new(watcher))))
    }
}

/// Map a `notify` event onto the record kinds the watcher cares about.
pub fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ChangeKind::Modified
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Metadata,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Other,
    }
}

fn to_change_event(event: &Event, path: &Path) -> ChangeEvent {
    let kind = classify(&event.kind);
    let length = match kind {
        ChangeKind::Modified => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        _ => 0,
    };
    ChangeEvent { kind, length }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};
    use rstest::rstest;

    #[rstest]
    #[case(EventKind::Modify(ModifyKind::Data(DataChange::Any)), ChangeKind::Modified)]
    #[case(EventKind::Modify(ModifyKind::Any), ChangeKind::Modified)]
    #[case(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), ChangeKind::Metadata)]
    #[case(EventKind::Modify(ModifyKind::Name(RenameMode::From)), ChangeKind::Renamed)]
    #[case(EventKind::Remove(RemoveKind::File), ChangeKind::Removed)]
    #[case(EventKind::Create(CreateKind::File), ChangeKind::Other)]
    #[case(EventKind::Access(AccessKind::Any), ChangeKind::Other)]
    fn classify_maps_notify_kinds(#[case] kind: EventKind, #[case] expected: ChangeKind) {
        assert_eq!(classify(&kind), expected);
    }

    #[tokio::test]
    async fn next_batch_drains_queued_records() {
        let (feed, mut stream) = EventStream::channel();
        for len in 1..=3 {
            assert!(feed.push(ChangeEvent::modified(len)));
        }

        let batch = stream.next_batch().await.expect("open").expect("batch");
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2].length, 3);
    }

    #[tokio::test]
    async fn error_ends_batch_and_is_returned_next() {
        let (feed, mut stream) = EventStream::channel();
        feed.push(ChangeEvent::modified(1));
        feed.fail(EventSourceError::Read("overflow".to_string()));
        feed.push(ChangeEvent::modified(2));

        let first = stream.next_batch().await.expect("open").expect("batch");
        assert_eq!(first, vec![ChangeEvent::modified(1)]);

        let second = stream.next_batch().await.expect("open");
        assert!(matches!(second, Err(EventSourceError::Read(_))));

        let third = stream.next_batch().await.expect("open").expect("batch");
        assert_eq!(third, vec![ChangeEvent::modified(2)]);
    }

    #[tokio::test]
    async fn dropping_feed_closes_stream() {
        let (feed, mut stream) = EventStream::channel();
        drop(feed);
        assert!(stream.next_batch().await.is_none());
    }

    #[test]
    fn notify_source_rejects_missing_path() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = NotifyEventSource::new()
            .open(&dir.path().join("absent.log"))
            .unwrap_err();
        assert!(matches!(err, EventSourceError::Open { .. }), "got: {err}");
    }
}
