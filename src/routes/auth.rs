// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in and sign-out routes.
//!
//! The interactive Google flow runs in the browser; the frontend posts the
//! resulting credential here.

use crate::error::Result;
use crate::models::Identity;
use crate::services::SignInCredential;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How long sign-in waits for the task list to start syncing.
const SYNC_START_TIMEOUT: Duration = Duration::from_secs(10);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
}

/// Credential from the Google sign-in popup.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchange a Google credential for a session.
///
/// Responds once the view-model has picked up the new identity, so the
/// task routes are usable as soon as this returns.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Identity>> {
    let credential = SignInCredential {
        id_token: request.id_token,
        access_token: request.access_token,
    };

    // Subscribe before signing in: the wait below must see the transition
    // this sign-in triggers, even when the uid is unchanged.
    let mut rx = state.view_model.watch_identity();
    rx.borrow_and_update();

    let identity = state.session.sign_in(&credential).await?;

    let synced = tokio::time::timeout(SYNC_START_TIMEOUT, async {
        loop {
            rx.changed().await?;
            if let Some(current) = rx
                .borrow_and_update()
                .as_ref()
                .filter(|current| current.uid == identity.uid)
            {
                return Ok::<_, watch::error::RecvError>(current.clone());
            }
        }
    })
    .await;

    match synced {
        Ok(Ok(current)) => Ok(Json(current)),
        _ => {
            tracing::warn!(uid = %identity.uid, "Task sync did not start in time");
            Ok(Json(identity))
        }
    }
}

/// End the session. Always succeeds locally.
async fn sign_out(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.sign_out();
    StatusCode::NO_CONTENT
}
