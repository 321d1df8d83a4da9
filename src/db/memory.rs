// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process task store with the same live-query contract as Firestore.
//!
//! Used for offline mode (`TASK_STORE=memory`) and tests.

use crate::db::{LiveQuery, TaskStore, SNAPSHOT_BUFFER};
use crate::error::AppError;
use crate::models::{NewTask, Task};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};

const CHANGE_BUFFER: usize = 64;

/// Thread-safe in-memory task store.
#[derive(Clone)]
pub struct InMemoryTaskStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tasks: RwLock<BTreeMap<String, Task>>,
    changes: broadcast::Sender<()>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(MemoryInner {
                tasks: RwLock::new(BTreeMap::new()),
                changes,
                next_id: AtomicU64::new(1),
                fail_writes: AtomicBool::new(false),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Make every subsequent write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write calls that reached the store, including failed ones.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of live queries currently open.
    pub fn open_queries(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    /// All stored tasks regardless of owner, in ID order.
    pub fn all_tasks(&self) -> Result<Vec<Task>, AppError> {
        let tasks = self.inner.tasks.read().map_err(lock_error)?;
        Ok(tasks.values().cloned().collect())
    }

    fn snapshot_for(inner: &MemoryInner, owner_id: &str) -> Result<Vec<Task>, AppError> {
        let tasks = inner.tasks.read().map_err(lock_error)?;
        Ok(tasks
            .values()
            .filter(|task| task.user_id == owner_id)
            .cloned()
            .collect())
    }

    /// Apply a write under the lock, then notify live queries.
    fn write<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, Task>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "Write rejected (injected failure)".to_string(),
            ));
        }

        let result = {
            let mut tasks = self.inner.tasks.write().map_err(lock_error)?;
            apply(&mut *tasks)?
        };

        // No receivers just means no open queries.
        let _ = self.inner.changes.send(());
        Ok(result)
    }
}

fn lock_error<E: std::fmt::Display>(err: E) -> AppError {
    AppError::Database(format!("In-memory store lock poisoned: {}", err))
}

fn missing(task_id: &str) -> AppError {
    AppError::NotFound(format!("Task {} not found", task_id))
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn watch_owner(&self, owner_id: &str) -> Result<LiveQuery, AppError> {
        // Subscribe before reading so no write between the two is missed.
        let mut changes = self.inner.changes.subscribe();
        let initial = Self::snapshot_for(&self.inner, owner_id)?;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let owner = owner_id.to_string();

        let worker = tokio::spawn(async move {
            if tx.send(initial).await.is_err() {
                return;
            }

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    change = changes.recv() => {
                        match change {
                            Ok(()) | Err(RecvError::Lagged(_)) => {}
                            Err(RecvError::Closed) => break,
                        }
                        let snapshot = match Self::snapshot_for(&inner, &owner) {
                            Ok(snapshot) => snapshot,
                            Err(e) => {
                                tracing::error!(error = %e, owner = %owner, "Snapshot read failed");
                                break;
                            }
                        };
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!(owner = %owner, "In-memory live query closed");
        });

        Ok(LiveQuery::new(rx, shutdown_tx, worker))
    }

    async fn create_task(&self, task: &NewTask) -> Result<String, AppError> {
        let id = format!(
            "task-{}",
            self.inner.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let stored = Task {
            id: id.clone(),
            text: task.text.clone(),
            completed: false,
            user_id: task.user_id.clone(),
            created_at: task.created_at.clone(),
            due_date_time: task.due_date_time.clone(),
        };

        self.write(|tasks| {
            tasks.insert(id.clone(), stored);
            Ok(())
        })?;
        Ok(id)
    }

    async fn set_completed(&self, task_id: &str, completed: bool) -> Result<(), AppError> {
        self.write(|tasks| {
            let task = tasks.get_mut(task_id).ok_or_else(|| missing(task_id))?;
            task.completed = completed;
            Ok(())
        })
    }

    async fn set_text(&self, task_id: &str, text: &str) -> Result<(), AppError> {
        self.write(|tasks| {
            let task = tasks.get_mut(task_id).ok_or_else(|| missing(task_id))?;
            task.text = text.to_string();
            Ok(())
        })
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), AppError> {
        self.write(|tasks| {
            tasks.remove(task_id).ok_or_else(|| missing(task_id))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(owner: &str, text: &str) -> NewTask {
        NewTask {
            text: text.to_string(),
            user_id: owner.to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            due_date_time: None,
        }
    }

    #[tokio::test]
    async fn live_query_pushes_initial_and_changed_snapshots() {
        let store = InMemoryTaskStore::new();
        store.create_task(&new_task("u1", "first")).await.unwrap();

        let mut query = store.watch_owner("u1").await.unwrap();
        let initial = query.next_snapshot().await.unwrap();
        assert_eq!(initial.len(), 1);

        store.create_task(&new_task("u1", "second")).await.unwrap();
        let next = query.next_snapshot().await.unwrap();
        assert_eq!(next.len(), 2);

        query.close().await;
        assert_eq!(store.open_queries(), 0);
    }

    #[tokio::test]
    async fn snapshots_only_contain_owner_tasks() {
        let store = InMemoryTaskStore::new();
        let mut query = store.watch_owner("u1").await.unwrap();
        assert!(query.next_snapshot().await.unwrap().is_empty());

        store.create_task(&new_task("u2", "not mine")).await.unwrap();
        assert!(query.next_snapshot().await.unwrap().is_empty());

        query.close().await;
    }

    #[tokio::test]
    async fn writes_to_missing_tasks_are_not_found() {
        let store = InMemoryTaskStore::new();
        let err = store.set_completed("nope", true).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            store.delete_task("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures_leave_store_unchanged() {
        let store = InMemoryTaskStore::new();
        store.set_fail_writes(true);

        let err = store.create_task(&new_task("u1", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert!(store.all_tasks().unwrap().is_empty());
        assert_eq!(store.write_count(), 1);
    }
}
