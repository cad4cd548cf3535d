//! Shared fixtures: a hand-driven event source and polling helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use errifier_core::{
    ChangeEvent, ChannelSink, EventFeed, EventSource, EventSourceError, EventStream, Notification,
    WatchConfig, WatchRegistry,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Event source whose streams are driven by the test through [`EventFeed`]s.
#[derive(Default)]
pub struct FakeSource {
    feeds: Mutex<HashMap<PathBuf, EventFeed>>,
    opens: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeSource {
    /// The most recent feed opened for `path`.
    pub fn feed(&self, path: &Path) -> EventFeed {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.feeds
            .lock()
            .expect("feeds lock")
            .get(&canonical)
            .cloned()
            .expect("no stream opened for path")
    }

    /// Drop the stored producer for `path`, closing its stream.
    pub fn close(&self, path: &Path) {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.feeds.lock().expect("feeds lock").remove(&canonical);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Make subsequent `open` calls fail.
    pub fn refuse_opens(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl EventSource for FakeSource {
    fn open(&self, path: &Path) -> Result<EventStream, EventSourceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(EventSourceError::Read("open refused".to_string()));
        }
        let (feed, stream) = EventStream::channel();
        self.feeds
            .lock()
            .expect("feeds lock")
            .insert(path.to_path_buf(), feed);
        Ok(stream)
    }
}

pub struct Harness {
    pub registry: WatchRegistry,
    pub source: Arc<FakeSource>,
    pub notifications: UnboundedReceiver<Notification>,
}

pub fn harness(capacity: usize) -> Harness {
    let config = WatchConfig {
        capacity,
        reopen_interval_ms: 10,
        ..WatchConfig::default()
    };
    let source = Arc::new(FakeSource::default());
    let (sink, notifications) = ChannelSink::new();
    let registry = WatchRegistry::new(&config, source.clone(), Arc::new(sink));
    Harness {
        registry,
        source,
        notifications,
    }
}

pub fn log_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"boot\n").expect("create log file");
    path
}

pub fn modified() -> ChangeEvent {
    ChangeEvent::modified(1)
}

/// Poll `condition` every few milliseconds for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub async fn next_notification(rx: &mut UnboundedReceiver<Notification>) -> Option<Notification> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}
