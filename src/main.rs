// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! todo-sync server
//!
//! Signs a user in with Firebase Authentication, keeps their task list in
//! sync with Firestore, and serves it to the frontend.

use std::sync::Arc;
use todo_sync::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, InMemoryTaskStore, TaskStore},
    services::{FirebaseAuthProvider, SessionAdapter, TaskViewModel},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting todo-sync");

    let store: Arc<dyn TaskStore> = match config.task_store {
        StoreBackend::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory task store; tasks are lost on exit");
            Arc::new(InMemoryTaskStore::new())
        }
    };

    let provider = Arc::new(
        FirebaseAuthProvider::new(&config).expect("Failed to initialize identity provider"),
    );
    let session = SessionAdapter::new(provider, config.placeholder_photo_url.clone());

    // The view-model follows the session for the life of the process
    let view_model = TaskViewModel::new(store, config.due_zone);
    let _sync_driver = view_model.bind(&session);
    tracing::info!(zone = ?config.due_zone, "Task view-model bound to session");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        session,
        view_model,
    });

    // Build router
    let app = todo_sync::routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.bind_host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("todo_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
