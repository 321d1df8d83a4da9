// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the signed-in identity's tasks.
//!
//! Writes answer 202 Accepted: their effect shows up in the list with the
//! next snapshot from the store, not in the response.

use crate::error::{AppError, Result};
use crate::models::{Identity, Task};
use crate::services::EditBuffer;
use crate::time_utils::{format_due, DueZone};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require a synced identity).
/// The session gate is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(commit_edit).delete(delete_task))
        .route("/api/tasks/{id}/toggle", post(toggle_task))
        .route(
            "/api/tasks/{id}/edit",
            post(begin_edit).patch(set_edit_text).delete(cancel_edit),
        )
}

// ─── Identity ────────────────────────────────────────────────

async fn get_me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

// ─── Task List ───────────────────────────────────────────────

/// One row of the rendered list.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TaskResponse {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: String,
    pub due_date_time: Option<String>,
    /// Due time for display, e.g. "1/1/2024, 9:00:00 AM" or "No deadline"
    pub due_display: String,
}

impl TaskResponse {
    fn from_task(task: Task, zone: DueZone) -> Self {
        let due_display = format_due(zone, task.due_date_time.as_deref());
        Self {
            id: task.id,
            text: task.text,
            completed: task.completed,
            created_at: task.created_at,
            due_date_time: task.due_date_time,
            due_display,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub editing: Option<EditBuffer>,
}

/// Current list, already sorted by due time.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<TaskListResponse> {
    let zone = state.view_model.due_zone();
    let tasks = state
        .view_model
        .tasks()
        .into_iter()
        .map(|task| TaskResponse::from_task(task, zone))
        .collect();

    Json(TaskListResponse {
        tasks,
        editing: state.view_model.editing(),
    })
}

// ─── Task Writes ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    text: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    due_date: Option<String>,
    /// `HH:MM`
    #[serde(default)]
    due_time: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateTaskResponse {
    /// None when the text was blank and nothing was written
    pub id: Option<String>,
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<CreateTaskResponse>)> {
    let id = state
        .view_model
        .add_task(
            &request.text,
            request.due_date.as_deref(),
            request.due_time.as_deref(),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(CreateTaskResponse { id })))
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    /// Completion state the caller currently sees
    completed: bool,
}

async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ToggleRequest>,
) -> Result<StatusCode> {
    state
        .view_model
        .toggle_complete(&id, request.completed)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.view_model.delete_task(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

// ─── Editing ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TextRequest {
    text: String,
}

async fn begin_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<TextRequest>,
) -> Result<Json<Option<EditBuffer>>> {
    state.view_model.begin_edit(&id, &request.text)?;
    Ok(Json(state.view_model.editing()))
}

async fn set_edit_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<TextRequest>,
) -> Result<Json<Option<EditBuffer>>> {
    let editing_this = state
        .view_model
        .editing()
        .is_some_and(|buffer| buffer.task_id == id);
    if !editing_this || !state.view_model.set_edit_text(&request.text) {
        return Err(AppError::BadRequest(format!(
            "Task {} is not being edited",
            id
        )));
    }
    Ok(Json(state.view_model.editing()))
}

async fn cancel_edit(State(state): State<Arc<AppState>>) -> StatusCode {
    state.view_model.cancel_edit();
    StatusCode::NO_CONTENT
}

async fn commit_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<TextRequest>,
) -> Result<StatusCode> {
    state.view_model.commit_edit(&id, &request.text).await?;
    Ok(StatusCode::ACCEPTED)
}
