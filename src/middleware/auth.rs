// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session gate for task routes.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires the view-model to be syncing an identity.
///
/// The identity is inserted as a request extension for handlers.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.view_model.is_syncing() {
        return Err(AppError::Unauthorized);
    }

    let identity = state.view_model.identity().ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
