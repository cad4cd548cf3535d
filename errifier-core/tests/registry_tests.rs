//! Registry admission, uniqueness, capacity, toggle and describe tests.

mod common;

use std::sync::Arc;

use assert_fs::prelude::*;
use errifier_core::{AddError, DuplicateField, EntryId, ToggleError, WatchState};

use common::{harness, log_file};

// ---------------------------------------------------------------------------
// 1. AddWatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn added_watch_is_listed_once_and_active() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    let path = log_file(dir.path(), "a.log");

    let id = h.registry.add_watch(&path, "svc-a").await.expect("add");
    assert_eq!(id, EntryId(0));

    let listed = h.registry.describe();
    let matching: Vec<_> = listed.iter().filter(|w| w.label == "svc-a").collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].state, WatchState::Active);
    assert_eq!(matching[0].path, std::fs::canonicalize(&path).expect("canonical"));
    assert!(matching[0].attached);
    assert_eq!(h.source.opens(), 1);
    h.registry.shutdown().await;
}

#[tokio::test]
async fn duplicate_path_and_label_are_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    let a = log_file(dir.path(), "a.log");
    let b = log_file(dir.path(), "b.log");

    assert_eq!(h.registry.add_watch(&a, "svc-a").await.expect("add"), EntryId(0));

    let err = h.registry.add_watch(&a, "svc-b").await.unwrap_err();
    assert!(
        matches!(err, AddError::Duplicate { field: DuplicateField::Path, .. }),
        "got: {err}"
    );

    let err = h.registry.add_watch(&b, "svc-a").await.unwrap_err();
    assert!(
        matches!(err, AddError::Duplicate { field: DuplicateField::Label, .. }),
        "got: {err}"
    );
    assert!(err.to_string().contains("svc-a"));

    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.source.opens(), 1, "rejected adds must not open a handle");
    h.registry.shutdown().await;
}

#[tokio::test]
async fn same_file_through_another_spelling_is_a_duplicate() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("logs").create_dir_all().expect("mkdir");
    let h = harness(8);
    let path = log_file(&dir.path().join("logs"), "a.log");
    let roundabout = dir.path().join("logs").join("..").join("logs").join("a.log");

    h.registry.add_watch(&path, "svc-a").await.expect("add");
    let err = h.registry.add_watch(&roundabout, "svc-b").await.unwrap_err();
    assert!(matches!(err, AddError::Duplicate { field: DuplicateField::Path, .. }));
    h.registry.shutdown().await;
}

#[tokio::test]
async fn missing_file_and_directory_are_invalid() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);

    let err = h
        .registry
        .add_watch(dir.path().join("absent.log"), "svc-a")
        .await
        .unwrap_err();
    assert!(matches!(err, AddError::InvalidFile { .. }), "got: {err}");

    let err = h.registry.add_watch(dir.path(), "svc-a").await.unwrap_err();
    assert!(matches!(err, AddError::InvalidFile { .. }), "got: {err}");

    assert!(h.registry.is_empty());
    assert_eq!(h.source.opens(), 0);
}

#[tokio::test]
async fn empty_label_is_missing() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    let err = h
        .registry
        .add_watch(log_file(dir.path(), "a.log"), "")
        .await
        .unwrap_err();
    assert!(matches!(err, AddError::MissingLabel));
    assert_eq!(h.source.opens(), 0);
}

#[tokio::test]
async fn capacity_is_never_exceeded() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(3);

    for i in 0..3 {
        let path = log_file(dir.path(), &format!("{i}.log"));
        h.registry.add_watch(&path, &format!("svc-{i}")).await.expect("add");
    }

    let overflow = log_file(dir.path(), "overflow.log");
    let err = h.registry.add_watch(&overflow, "svc-x").await.unwrap_err();
    assert!(matches!(err, AddError::CapacityExceeded { capacity: 3 }), "got: {err}");
    assert_eq!(h.registry.len(), 3);
    assert_eq!(h.source.opens(), 3);

    // Removing one frees a slot.
    h.registry.remove(EntryId(1)).await.expect("remove");
    h.registry.add_watch(&overflow, "svc-x").await.expect("add after remove");
    assert_eq!(h.registry.len(), 3);
    h.registry.shutdown().await;
}

#[tokio::test]
async fn event_source_failure_leaves_no_entry() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    h.source.refuse_opens(true);

    let err = h
        .registry
        .add_watch(log_file(dir.path(), "a.log"), "svc-a")
        .await
        .unwrap_err();
    assert!(matches!(err, AddError::EventSource(_)), "got: {err}");
    assert!(h.registry.is_empty());

    h.source.refuse_opens(false);
    let id = h
        .registry
        .add_watch(dir.path().join("a.log"), "svc-a")
        .await
        .expect("retry succeeds");
    assert_eq!(id, EntryId(0), "failed add must not consume an id");
    h.registry.shutdown().await;
}

#[tokio::test]
async fn concurrent_adds_of_one_label_admit_exactly_one() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(64);
    let registry = Arc::new(h.registry);

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        let path = log_file(dir.path(), &format!("{i}.log"));
        handles.push(tokio::spawn(async move {
            registry.add_watch(path, "shared").await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => admitted += 1,
            Err(AddError::Duplicate { field: DuplicateField::Label, .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(registry.len(), 1);
    registry.shutdown().await;
}

// ---------------------------------------------------------------------------
// 2. Toggle and describe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn toggle_twice_restores_state() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    let id = h
        .registry
        .add_watch(log_file(dir.path(), "a.log"), "svc-a")
        .await
        .expect("add");

    assert_eq!(h.registry.toggle(id).expect("toggle"), WatchState::Paused);
    assert_eq!(h.registry.get(id).expect("get").state, WatchState::Paused);
    assert_eq!(h.registry.toggle(id).expect("toggle"), WatchState::Active);
    assert_eq!(h.registry.get(id).expect("get").state, WatchState::Active);
    h.registry.shutdown().await;
}

#[tokio::test]
async fn toggle_unknown_id_is_not_found() {
    let h = harness(8);
    assert_eq!(
        h.registry.toggle(EntryId(3)).unwrap_err(),
        ToggleError::NotFound { id: EntryId(3) }
    );
}

#[tokio::test]
async fn describe_is_in_creation_order_and_repeatable() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    for label in ["zeta", "alpha", "mid"] {
        let path = log_file(dir.path(), &format!("{label}.log"));
        h.registry.add_watch(&path, label).await.expect("add");
    }
    h.registry.toggle(EntryId(1)).expect("toggle");

    let first = h.registry.describe();
    let second = h.registry.describe();
    assert_eq!(first, second);

    let labels: Vec<_> = first.iter().map(|w| w.label.as_str()).collect();
    assert_eq!(labels, vec!["zeta", "alpha", "mid"]);
    let states: Vec<_> = first.iter().map(|w| w.state).collect();
    assert_eq!(
        states,
        vec![WatchState::Active, WatchState::Paused, WatchState::Active]
    );
    h.registry.shutdown().await;
}

// ---------------------------------------------------------------------------
// 3. Remove
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_frees_path_and_label() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let h = harness(8);
    let path = log_file(dir.path(), "a.log");

    let id = h.registry.add_watch(&path, "svc-a").await.expect("add");
    let removed = h.registry.remove(id).await.expect("remove");
    assert_eq!(removed.label, "svc-a");
    assert!(h.registry.describe().is_empty());

    let again = h.registry.add_watch(&path, "svc-a").await.expect("re-add");
    assert_eq!(again, EntryId(1));
    h.registry.shutdown().await;
}
