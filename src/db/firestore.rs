// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the task store.
//!
//! Tasks live in the `tasks` collection, one document per task, with the
//! owner in the `userId` field. Live queries use a Firestore listen target
//! filtered on `userId` and re-read the full result set at each consistency
//! point after a document change.

use crate::db::{collections, LiveQuery, TaskStore, SNAPSHOT_BUFFER};
use crate::error::AppError;
use crate::models::{NewTask, Task, TaskDocument};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{
    FirestoreListenEvent, FirestoreListenerTarget, FirestoreMemListenStateStorage,
    FirestoreWritePrecondition,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Listen target ID for the per-owner task query.
const OWNER_TARGET_ID: u32 = 17;

type ListenResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

#[derive(Serialize, Deserialize)]
struct CompletedPatch {
    completed: bool,
}

#[derive(Serialize, Deserialize)]
struct TextPatch {
    text: String,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Read every task owned by `owner_id`.
    pub async fn get_tasks_for_owner(&self, owner_id: &str) -> Result<Vec<Task>, AppError> {
        query_owner(self.get_client()?, owner_id).await
    }

    /// Read a single task by document ID.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, AppError> {
        let doc: Option<TaskDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TASKS)
            .obj()
            .one(task_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(doc.and_then(TaskDocument::into_task))
    }
}

/// Run the owner-filtered query and convert documents to tasks.
async fn query_owner(
    client: &firestore::FirestoreDb,
    owner_id: &str,
) -> Result<Vec<Task>, AppError> {
    let docs: Vec<TaskDocument> = client
        .fluent()
        .select()
        .from(collections::TASKS)
        .filter(|q| q.field("userId").eq(owner_id))
        .obj()
        .query()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(docs
        .into_iter()
        .filter_map(|doc| {
            let task = doc.into_task();
            if task.is_none() {
                tracing::warn!(owner = owner_id, "Skipping task document without ID");
            }
            task
        })
        .collect())
}

#[async_trait]
impl TaskStore for FirestoreDb {
    async fn watch_owner(&self, owner_id: &str) -> Result<LiveQuery, AppError> {
        let client = self.get_client()?.clone();
        let owner = owner_id.to_string();

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| AppError::Database(format!("Failed to create listener: {}", e)))?;

        let filter_owner = owner.clone();
        client
            .fluent()
            .select()
            .from(collections::TASKS)
            .filter(move |q| q.field("userId").eq(filter_owner.clone()))
            .listen()
            .add_target(FirestoreListenerTarget::new(OWNER_TARGET_ID), &mut listener)
            .map_err(|e| AppError::Database(format!("Failed to add listen target: {}", e)))?;

        // Push the current result set before any change arrives.
        let initial = query_owner(&client, &owner).await?;
        tx.send(initial)
            .await
            .map_err(|_| AppError::Database("Live query receiver dropped".to_string()))?;

        let dirty = Arc::new(AtomicBool::new(false));
        let cb_client = client.clone();
        let cb_owner = owner.clone();
        let cb_tx = tx.clone();

        listener
            .start(move |event| {
                let client = cb_client.clone();
                let owner = cb_owner.clone();
                let tx = cb_tx.clone();
                let dirty = dirty.clone();
                async move { on_listen_event(event, &client, &owner, &tx, &dirty).await }
            })
            .await
            .map_err(|e| AppError::Database(format!("Failed to start listener: {}", e)))?;

        tracing::info!(owner = %owner, "Firestore live query opened");

        let worker = tokio::spawn(async move {
            // Fires on close() or when the LiveQuery is dropped.
            let _ = shutdown_rx.await;
            if let Err(e) = listener.shutdown().await {
                tracing::warn!(error = %e, owner = %owner, "Firestore listener shutdown failed");
            }
            drop(tx);
            tracing::info!(owner = %owner, "Firestore live query closed");
        });

        Ok(LiveQuery::new(rx, shutdown_tx, worker))
    }

    async fn create_task(&self, task: &NewTask) -> Result<String, AppError> {
        let doc = TaskDocument::from(task);

        let created: TaskDocument = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::TASKS)
            .generate_document_id()
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let id = created
            .id
            .ok_or_else(|| AppError::Database("Created task has no document ID".to_string()))?;

        tracing::debug!(task_id = %id, owner = %task.user_id, "Task created");
        Ok(id)
    }

    async fn set_completed(&self, task_id: &str, completed: bool) -> Result<(), AppError> {
        let patch = CompletedPatch { completed };
        let _: TaskDocument = self
            .get_client()?
            .fluent()
            .update()
            .fields(["completed"])
            .in_col(collections::TASKS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(task_id)
            .object(&patch)
            .execute()
            .await
            .map_err(|e| update_error(task_id, e))?;
        Ok(())
    }

    async fn set_text(&self, task_id: &str, text: &str) -> Result<(), AppError> {
        let patch = TextPatch {
            text: text.to_string(),
        };
        let _: TaskDocument = self
            .get_client()?
            .fluent()
            .update()
            .fields(["text"])
            .in_col(collections::TASKS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(task_id)
            .object(&patch)
            .execute()
            .await
            .map_err(|e| update_error(task_id, e))?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::TASKS)
            .document_id(task_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Updates must not create documents, so a missing task is `NotFound`.
fn update_error(task_id: &str, err: FirestoreError) -> AppError {
    match err {
        FirestoreError::DataNotFoundError(_) => {
            AppError::NotFound(format!("Task {} not found", task_id))
        }
        other => AppError::Database(other.to_string()),
    }
}

/// Handle one listen response.
///
/// Document events only mark the target dirty; the following target change
/// marks a consistent point, where the full result set is re-read and
/// pushed.
async fn on_listen_event(
    event: FirestoreListenEvent,
    client: &firestore::FirestoreDb,
    owner: &str,
    tx: &mpsc::Sender<Vec<Task>>,
    dirty: &AtomicBool,
) -> ListenResult {
    match event {
        FirestoreListenEvent::DocumentChange(_)
        | FirestoreListenEvent::DocumentDelete(_)
        | FirestoreListenEvent::DocumentRemove(_) => {
            dirty.store(true, Ordering::SeqCst);
        }
        FirestoreListenEvent::TargetChange(_) => {
            if dirty.swap(false, Ordering::SeqCst) {
                let snapshot = query_owner(client, owner).await?;
                tracing::debug!(owner, count = snapshot.len(), "Pushing task snapshot");
                // A closed receiver means the query is shutting down.
                let _ = tx.send(snapshot).await;
            }
        }
        _ => {}
    }
    Ok(())
}
