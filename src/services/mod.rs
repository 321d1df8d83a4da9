// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod session;
pub mod task_sync;

pub use identity::{FirebaseAuthProvider, IdentityProvider, SignInCredential};
pub use session::{SessionAdapter, SessionSubscription};
pub use task_sync::{EditBuffer, TaskViewModel};
