// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! todo-sync: a per-user to-do list kept in sync with a document store.
//!
//! A signed-in identity gets a live view of its own tasks. Every change in
//! the store is pushed back as a full snapshot, and an HTTP bridge exposes
//! the list and the task intents to a frontend.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{SessionAdapter, TaskViewModel};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub session: SessionAdapter,
    pub view_model: TaskViewModel,
}
