// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Start one with `gcloud emulators firestore start` and export
//! FIRESTORE_EMULATOR_HOST before running them.
//!
//! Each test uses a fresh owner ID, so runs do not interfere.

use std::sync::Arc;
use std::time::Duration;
use todo_sync::db::{FirestoreDb, LiveQuery, TaskStore};
use todo_sync::error::AppError;
use todo_sync::models::{Identity, NewTask, Task};
use todo_sync::services::TaskViewModel;
use todo_sync::time_utils::{now_iso, DueZone};

mod common;
use common::{test_db, wait_for_tasks, WAIT};

/// Generate a unique owner ID for test isolation.
fn unique_owner() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("owner-{}", nanos)
}

fn new_task(owner: &str, text: &str, due: Option<&str>) -> NewTask {
    NewTask {
        text: text.to_string(),
        user_id: owner.to_string(),
        created_at: now_iso(),
        due_date_time: due.map(str::to_string),
    }
}

/// Read snapshots until one satisfies `pred`.
async fn next_matching<F>(query: &mut LiveQuery, mut pred: F) -> Vec<Task>
where
    F: FnMut(&[Task]) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let snapshot = query.next_snapshot().await.expect("live query ended");
            if pred(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_and_read_back() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();

    let id = db
        .create_task(&new_task(&owner, "Buy milk", Some("2024-01-01T09:00:00.000Z")))
        .await
        .unwrap();

    let tasks = db.get_tasks_for_owner(&owner).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
    assert_eq!(tasks[0].text, "Buy milk");
    assert!(!tasks[0].completed);
    assert_eq!(
        tasks[0].due_date_time.as_deref(),
        Some("2024-01-01T09:00:00.000Z")
    );

    println!("✓ Task created and read back: id={}", id);
}

#[tokio::test]
async fn test_partial_updates_keep_other_fields() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let id = db
        .create_task(&new_task(&owner, "original", None))
        .await
        .unwrap();

    db.set_completed(&id, true).await.unwrap();
    db.set_text(&id, "edited").await.unwrap();

    let task = db.get_task(&id).await.unwrap().expect("task exists");
    assert_eq!(task.text, "edited");

    let tasks = db.get_tasks_for_owner(&owner).await.unwrap();
    assert_eq!(tasks[0].text, "edited");
    assert!(tasks[0].completed);
    assert_eq!(tasks[0].user_id, owner);
    assert_eq!(tasks[0].due_date_time, None);
}

#[tokio::test]
async fn test_delete_task() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let id = db.create_task(&new_task(&owner, "gone", None)).await.unwrap();

    db.delete_task(&id).await.unwrap();
    assert!(db.get_tasks_for_owner(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_of_deleted_task_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let id = db
        .create_task(&new_task(&owner, "short-lived", None))
        .await
        .unwrap();
    db.delete_task(&id).await.unwrap();

    assert!(matches!(
        db.set_completed(&id, true).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        db.set_text(&id, "revived").await,
        Err(AppError::NotFound(_))
    ));

    // No partial document was written back
    assert!(matches!(db.get_task(&id).await, Ok(None)));
    assert!(db.get_tasks_for_owner(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_live_query_pushes_snapshots() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let other = unique_owner();

    let mut query = db.watch_owner(&owner).await.unwrap();
    let initial = query.next_snapshot().await.unwrap();
    assert!(initial.is_empty());

    db.create_task(&new_task(&other, "not mine", None))
        .await
        .unwrap();
    let id = db
        .create_task(&new_task(&owner, "mine", None))
        .await
        .unwrap();

    let snapshot = next_matching(&mut query, |tasks| !tasks.is_empty()).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, id);

    db.delete_task(&id).await.unwrap();
    next_matching(&mut query, |tasks| tasks.is_empty()).await;

    query.close().await;
}

#[tokio::test]
async fn test_view_model_over_firestore() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let vm = TaskViewModel::new(Arc::new(db), DueZone::Utc);

    vm.on_identity_changed(Some(Identity {
        uid: owner.clone(),
        display_name: "Test".to_string(),
        email: "test@example.com".to_string(),
        photo_url: "https://via.placeholder.com/150".to_string(),
    }))
    .await
    .unwrap();

    vm.add_task("later", Some("2024-02-01"), Some("10:00"))
        .await
        .unwrap();
    vm.add_task("sooner", Some("2024-01-01"), Some("09:00"))
        .await
        .unwrap();

    let tasks = wait_for_tasks(&vm, |tasks| tasks.len() == 2).await;
    assert_eq!(tasks[0].text, "sooner");
    assert_eq!(tasks[1].text, "later");

    vm.on_identity_changed(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(vm.tasks().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE MODE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_mode_errors() {
    let db = FirestoreDb::new_mock();

    assert!(matches!(
        db.create_task(&new_task("u1", "x", None)).await,
        Err(AppError::Database(_))
    ));
    assert!(matches!(
        db.watch_owner("u1").await,
        Err(AppError::Database(_))
    ));
    assert!(matches!(
        db.get_tasks_for_owner("u1").await,
        Err(AppError::Database(_))
    ));
}
