// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod task;
pub mod user;

pub use task::{NewTask, Task, TaskDocument};
pub use user::{Identity, ProviderProfile, ProviderSession};
