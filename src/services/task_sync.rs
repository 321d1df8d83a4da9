// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task synchronization view-model.
//!
//! Keeps the signed-in identity's task list in sync with the store:
//! - Idle: no identity, empty list, no live query
//! - Syncing: one live query filtered on the identity; every snapshot
//!   replaces the whole list
//!
//! Mutations are plain store writes. Their result reaches the list only
//! through the next snapshot, so reordered acknowledgements never leave the
//! list inconsistent with the store.

use crate::db::{LiveQuery, TaskStore};
use crate::error::{AppError, Result};
use crate::models::task::sort_by_due;
use crate::models::{Identity, NewTask, Task};
use crate::services::session::SessionAdapter;
use crate::time_utils::{compose_due, now_iso, DueZone};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// In-progress edit of one task's text. Lives outside the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EditBuffer {
    pub task_id: String,
    pub text: String,
}

/// View-model over the current identity's tasks.
#[derive(Clone)]
pub struct TaskViewModel {
    inner: Arc<ViewModelInner>,
}

struct ViewModelInner {
    store: Arc<dyn TaskStore>,
    due_zone: DueZone,
    tasks: watch::Sender<Vec<Task>>,
    identity: watch::Sender<Option<Identity>>,
    state: Mutex<SyncState>,
    /// Serializes identity transitions; holds the open live query.
    active: tokio::sync::Mutex<Option<ActiveSync>>,
}

#[derive(Default)]
struct SyncState {
    /// Bumped on every identity transition. Snapshots tagged with an older
    /// generation are discarded.
    generation: u64,
    syncing: bool,
    editing: Option<EditBuffer>,
}

/// The pump task forwarding one live query into the view-model.
struct ActiveSync {
    generation: u64,
    stop: oneshot::Sender<()>,
    pump: JoinHandle<()>,
}

impl ActiveSync {
    fn start(inner: &Arc<ViewModelInner>, generation: u64, owner: String, live: LiveQuery) -> Self {
        let (stop, stop_rx) = oneshot::channel();
        let pump = tokio::spawn(pump_snapshots(
            Arc::downgrade(inner),
            generation,
            owner,
            live,
            stop_rx,
        ));
        Self {
            generation,
            stop,
            pump,
        }
    }

    /// Stop the pump and wait until its live query is fully closed.
    async fn close(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.pump.await {
            tracing::warn!(error = %e, generation = self.generation, "Snapshot pump failed");
        }
    }
}

async fn pump_snapshots(
    inner: Weak<ViewModelInner>,
    generation: u64,
    owner: String,
    mut live: LiveQuery,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            snapshot = live.next_snapshot() => {
                let Some(inner) = inner.upgrade() else { break };
                match snapshot {
                    Some(tasks) => {
                        inner.apply_snapshot(generation, &owner, tasks);
                    }
                    None => {
                        tracing::warn!(owner = %owner, generation, "Live query ended unexpectedly");
                        inner.mark_stopped(generation);
                        break;
                    }
                }
            }
        }
    }

    live.close().await;
}

impl ViewModelInner {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the task list with a snapshot, unless the snapshot belongs to
    /// a live query that has since been replaced or torn down.
    fn apply_snapshot(&self, generation: u64, owner: &str, snapshot: Vec<Task>) -> bool {
        let state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "Discarding stale snapshot"
            );
            return false;
        }

        let mut tasks: Vec<Task> = snapshot
            .into_iter()
            .filter(|task| task.user_id == owner)
            .collect();
        sort_by_due(&mut tasks);

        tracing::debug!(owner, count = tasks.len(), "Applied task snapshot");
        self.tasks.send_replace(tasks);
        true
    }

    fn mark_stopped(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.generation == generation {
            state.syncing = false;
        }
    }
}

impl TaskViewModel {
    pub fn new(store: Arc<dyn TaskStore>, due_zone: DueZone) -> Self {
        let (tasks, _) = watch::channel(Vec::new());
        let (identity, _) = watch::channel(None);
        Self {
            inner: Arc::new(ViewModelInner {
                store,
                due_zone,
                tasks,
                identity,
                state: Mutex::new(SyncState::default()),
                active: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Follow a session adapter: every identity notification is applied with
    /// [`TaskViewModel::on_identity_changed`].
    pub fn bind(&self, session: &SessionAdapter) -> JoinHandle<()> {
        let mut subscription = session.subscribe();
        let view_model = self.clone();

        tokio::spawn(async move {
            while let Some(identity) = subscription.next().await {
                if let Err(e) = view_model.on_identity_changed(identity).await {
                    tracing::error!(error = %e, "Failed to apply identity change");
                }
            }

            tracing::info!("Session adapter gone, stopping task sync");
            if let Err(e) = view_model.on_identity_changed(None).await {
                tracing::error!(error = %e, "Failed to stop task sync");
            }
        })
    }

    /// Transition to Idle (None) or Syncing (Some) for a new identity.
    ///
    /// The previous live query, if any, is fully closed before the next one
    /// opens, so its snapshots can never land in the new state. A failure to
    /// open the query is returned; the identity is kept with an empty list.
    pub async fn on_identity_changed(&self, identity: Option<Identity>) -> Result<()> {
        let inner = &self.inner;
        let mut active = inner.active.lock().await;

        // No identity is visible while the transition is in progress.
        inner
            .identity
            .send_if_modified(|current| current.take().is_some());

        if let Some(sync) = active.take() {
            sync.close().await;
        }

        let generation = {
            let mut state = inner.lock_state();
            state.generation += 1;
            state.syncing = false;
            state.editing = None;
            state.generation
        };
        inner.tasks.send_replace(Vec::new());

        let Some(identity) = identity else {
            tracing::info!(generation, "Task sync idle");
            return Ok(());
        };

        let result = match inner.store.watch_owner(&identity.uid).await {
            Ok(live) => {
                inner.lock_state().syncing = true;
                *active = Some(ActiveSync::start(
                    inner,
                    generation,
                    identity.uid.clone(),
                    live,
                ));
                tracing::info!(uid = %identity.uid, generation, "Task sync started");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, uid = %identity.uid, "Failed to open live query");
                Err(e)
            }
        };

        // Published last, so a watcher that sees the identity also sees the
        // live query in place.
        inner.identity.send_replace(Some(identity));
        result
    }

    // ─── Observers ───────────────────────────────────────────────

    /// Current task list, sorted by due time.
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.tasks.borrow().clone()
    }

    /// Receiver that is notified on every list replacement.
    pub fn watch_tasks(&self) -> watch::Receiver<Vec<Task>> {
        self.inner.tasks.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.identity.borrow().clone()
    }

    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.identity.subscribe()
    }

    /// True while a live query is open.
    pub fn is_syncing(&self) -> bool {
        self.inner.lock_state().syncing
    }

    pub fn editing(&self) -> Option<EditBuffer> {
        self.inner.lock_state().editing.clone()
    }

    pub fn due_zone(&self) -> DueZone {
        self.inner.due_zone
    }

    /// Intents need an identity with an open live query. An identity whose
    /// query failed to open counts as Idle.
    fn require_owner(&self) -> Result<String> {
        if !self.inner.lock_state().syncing {
            return Err(AppError::Unauthorized);
        }
        self.inner
            .identity
            .borrow()
            .as_ref()
            .map(|identity| identity.uid.clone())
            .ok_or(AppError::Unauthorized)
    }

    /// Writes are only issued for tasks in the current list, which only
    /// ever holds the identity's own tasks.
    fn require_listed(&self, task_id: &str) -> Result<()> {
        if self.inner.tasks.borrow().iter().any(|task| task.id == task_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Task {} not found", task_id)))
        }
    }

    // ─── Mutations ───────────────────────────────────────────────

    /// Create a task for the current identity.
    ///
    /// Blank text is ignored and returns `Ok(None)`. The due time is set only
    /// when both date and time are given. Returns the new task's ID; the task
    /// itself shows up with the next snapshot.
    pub async fn add_task(
        &self,
        text: &str,
        due_date: Option<&str>,
        due_time: Option<&str>,
    ) -> Result<Option<String>> {
        let owner = self.require_owner()?;

        if text.trim().is_empty() {
            tracing::debug!(owner = %owner, "Ignoring blank task");
            return Ok(None);
        }

        let task = NewTask {
            text: text.to_string(),
            user_id: owner.clone(),
            created_at: now_iso(),
            due_date_time: compose_due(self.inner.due_zone, due_date, due_time),
        };

        let id = self
            .inner
            .store
            .create_task(&task)
            .await
            .map_err(|e| write_failed("create", None, e))?;

        tracing::info!(task_id = %id, owner = %owner, "Task created");
        Ok(Some(id))
    }

    /// Flip a task's completed flag relative to the value the caller saw.
    pub async fn toggle_complete(&self, task_id: &str, current_completed: bool) -> Result<()> {
        self.require_owner()?;
        self.require_listed(task_id)?;
        self.inner
            .store
            .set_completed(task_id, !current_completed)
            .await
            .map_err(|e| write_failed("toggle", Some(task_id), e))
    }

    /// Start editing a task. Replaces any edit already in progress.
    pub fn begin_edit(&self, task_id: &str, current_text: &str) -> Result<()> {
        self.require_owner()?;
        self.require_listed(task_id)?;
        self.inner.lock_state().editing = Some(EditBuffer {
            task_id: task_id.to_string(),
            text: current_text.to_string(),
        });
        Ok(())
    }

    /// Update the edit buffer. Returns false if nothing is being edited.
    pub fn set_edit_text(&self, text: &str) -> bool {
        match self.inner.lock_state().editing.as_mut() {
            Some(buffer) => {
                buffer.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Abandon the current edit without writing.
    pub fn cancel_edit(&self) {
        self.inner.lock_state().editing = None;
    }

    /// Write the new text and clear the edit buffer.
    ///
    /// The buffer is kept if the write fails.
    pub async fn commit_edit(&self, task_id: &str, new_text: &str) -> Result<()> {
        self.require_owner()?;
        self.require_listed(task_id)?;
        self.inner
            .store
            .set_text(task_id, new_text)
            .await
            .map_err(|e| write_failed("edit", Some(task_id), e))?;

        let mut state = self.inner.lock_state();
        if state
            .editing
            .as_ref()
            .is_some_and(|buffer| buffer.task_id == task_id)
        {
            state.editing = None;
        }
        Ok(())
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        self.require_owner()?;
        self.require_listed(task_id)?;
        self.inner
            .store
            .delete_task(task_id)
            .await
            .map_err(|e| write_failed("delete", Some(task_id), e))
    }
}

fn write_failed(operation: &'static str, task_id: Option<&str>, err: AppError) -> AppError {
    let task_id = task_id.unwrap_or("<new>");
    if err.is_store_error() {
        tracing::warn!(error = %err, operation, task_id, "Task write failed");
    } else {
        tracing::debug!(error = %err, operation, task_id, "Task write rejected");
    }
    err
}
