//! Database layer: the task store port and its adapters.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemoryTaskStore;

use crate::error::AppError;
use crate::models::{NewTask, Task};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Collection names as constants.
pub mod collections {
    pub const TASKS: &str = "tasks";
}

/// Snapshots buffered per live query before the producer waits.
pub(crate) const SNAPSHOT_BUFFER: usize = 16;

/// Document store contract used by the task view-model.
///
/// Writes are independent calls with no batching or transaction guarantee.
/// Their effect becomes visible to readers only through live query
/// snapshots.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Open a live query over all tasks owned by `owner_id`.
    ///
    /// The query pushes the full matching result set once on open and again
    /// after every change to a matching document.
    async fn watch_owner(&self, owner_id: &str) -> Result<LiveQuery, AppError>;

    /// Create a task and return the store-assigned ID.
    async fn create_task(&self, task: &NewTask) -> Result<String, AppError>;

    /// Set the `completed` field of a task.
    async fn set_completed(&self, task_id: &str, completed: bool) -> Result<(), AppError>;

    /// Replace the text of a task.
    async fn set_text(&self, task_id: &str, text: &str) -> Result<(), AppError>;

    /// Delete a task.
    async fn delete_task(&self, task_id: &str) -> Result<(), AppError>;
}

/// Handle to an open live query.
///
/// Snapshots arrive on an internal channel filled by a worker task owned by
/// the store adapter. `close` stops that worker and waits for it to finish,
/// so no snapshot produced by this query can be observed afterwards.
pub struct LiveQuery {
    snapshots: mpsc::Receiver<Vec<Task>>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl LiveQuery {
    /// Assemble a live query from its parts. The worker must exit once the
    /// shutdown signal fires (or its sender is dropped).
    pub fn new(
        snapshots: mpsc::Receiver<Vec<Task>>,
        shutdown: oneshot::Sender<()>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            snapshots,
            shutdown: Some(shutdown),
            worker: Some(worker),
        }
    }

    /// Wait for the next full snapshot. Returns None once the query ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Task>> {
        self.snapshots.recv().await
    }

    /// Stop the query and wait for the worker to exit.
    pub async fn close(mut self) {
        self.snapshots.close();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Live query worker did not exit cleanly");
            }
        }
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        // Dropped without close(): signal the worker and let it wind down.
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
