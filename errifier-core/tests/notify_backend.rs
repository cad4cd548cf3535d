//! End-to-end check against the platform watcher.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use errifier_core::{ChannelSink, NotifyEventSource, WatchConfig, WatchRegistry};
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn appending_to_a_watched_file_notifies() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("svc.log");
    std::fs::write(&path, b"started\n").expect("create log");

    let (sink, mut notifications) = ChannelSink::new();
    let registry = WatchRegistry::new(
        &WatchConfig::default(),
        Arc::new(NotifyEventSource::new()),
        Arc::new(sink),
    );
    registry.add_watch(&path, "svc").await.expect("add");

    // Give the backend a moment to arm before writing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("open for append");
    writeln!(file, "ERROR something broke").expect("append");
    file.sync_all().expect("sync");

    let note = tokio::time::timeout(Duration::from_secs(10), notifications.recv())
        .await
        .expect("notification within timeout")
        .expect("sink open");
    assert_eq!(note.title, "svc");
    assert_eq!(note.message, "There is error in svc. Please check your logs");

    registry.shutdown().await;
}
