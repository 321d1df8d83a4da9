// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use todo_sync::config::Config;
use todo_sync::db::{FirestoreDb, InMemoryTaskStore};
use todo_sync::error::AppError;
use todo_sync::models::{Identity, ProviderProfile, ProviderSession, Task};
use todo_sync::routes::create_router;
use todo_sync::services::{IdentityProvider, SessionAdapter, SignInCredential, TaskViewModel};
use todo_sync::AppState;

/// How long tests wait for a snapshot or identity to arrive.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(5);

/// Credential token the fake provider rejects.
#[allow(dead_code)]
pub const REJECTED_TOKEN: &str = "rejected";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// In-process identity provider.
///
/// The credential's ID token is taken as the uid. Profiles can be changed
/// after sign-in to exercise the forced reload.
#[derive(Default)]
pub struct FakeProvider {
    profiles: Mutex<HashMap<String, ProviderProfile>>,
    fail_reload: AtomicBool,
    reloads: AtomicUsize,
    sign_outs: AtomicUsize,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Change the profile the provider reports for `uid`.
    pub fn set_profile(&self, uid: &str, profile: ProviderProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(uid.to_string(), profile);
    }

    pub fn set_fail_reload(&self, fail: bool) {
        self.fail_reload.store(fail, Ordering::SeqCst);
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn profile_for(&self, uid: &str) -> ProviderProfile {
        self.profiles
            .lock()
            .unwrap()
            .get(uid)
            .cloned()
            .unwrap_or_else(|| default_profile(uid))
    }
}

#[allow(dead_code)]
pub fn default_profile(uid: &str) -> ProviderProfile {
    ProviderProfile {
        display_name: Some(format!("{} Tester", uid)),
        email: Some(format!("{}@example.com", uid)),
        photo_url: None,
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in(&self, credential: &SignInCredential) -> Result<ProviderSession, AppError> {
        let uid = credential
            .id_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::BadRequest("An ID token is required".to_string()))?;

        if uid == REJECTED_TOKEN {
            return Err(AppError::AuthFailed("INVALID_IDP_RESPONSE".to_string()));
        }

        Ok(ProviderSession {
            id_token: format!("{}-id-0", uid),
            refresh_token: format!("{}-refresh", uid),
            profile: self.profile_for(&uid),
            uid,
        })
    }

    async fn reload(&self, session: &ProviderSession) -> Result<ProviderSession, AppError> {
        let n = self.reloads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_reload.load(Ordering::SeqCst) {
            return Err(AppError::IdentityProvider("lookup unavailable".to_string()));
        }

        Ok(ProviderSession {
            uid: session.uid.clone(),
            id_token: format!("{}-id-{}", session.uid, n),
            refresh_token: session.refresh_token.clone(),
            profile: self.profile_for(&session.uid),
        })
    }

    async fn sign_out(&self, _session: &ProviderSession) -> Result<(), AppError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Credential that signs in as `uid` with the fake provider.
#[allow(dead_code)]
pub fn credential(uid: &str) -> SignInCredential {
    SignInCredential {
        id_token: Some(uid.to_string()),
        access_token: None,
    }
}

/// Everything a test needs to drive the app and inspect its collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: InMemoryTaskStore,
    pub provider: Arc<FakeProvider>,
}

/// Create a test app with an in-memory store and the fake provider.
///
/// Must be called inside a Tokio runtime: the view-model is bound to the
/// session immediately.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::test_default();
    let store = InMemoryTaskStore::new();
    let provider = FakeProvider::new();

    let session = SessionAdapter::new(provider.clone(), config.placeholder_photo_url.clone());
    let view_model = TaskViewModel::new(Arc::new(store.clone()), config.due_zone);
    view_model.bind(&session);

    let state = Arc::new(AppState {
        config,
        session,
        view_model,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        provider,
    }
}

/// Wait until the view-model's list satisfies `pred` and return it.
#[allow(dead_code)]
pub async fn wait_for_tasks<F>(view_model: &TaskViewModel, mut pred: F) -> Vec<Task>
where
    F: FnMut(&[Task]) -> bool,
{
    let mut rx = view_model.watch_tasks();
    let tasks = tokio::time::timeout(WAIT, rx.wait_for(|tasks| pred(tasks)))
        .await
        .expect("timed out waiting for task list")
        .expect("view-model dropped");
    tasks.clone()
}

/// Wait until the view-model's identity has uid `uid` (or is absent for None).
#[allow(dead_code)]
pub async fn wait_for_identity(view_model: &TaskViewModel, uid: Option<&str>) -> Option<Identity> {
    let mut rx = view_model.watch_identity();
    let identity = tokio::time::timeout(
        WAIT,
        rx.wait_for(|identity| identity.as_ref().map(|i| i.uid.as_str()) == uid),
    )
    .await
    .expect("timed out waiting for identity")
    .expect("view-model dropped");
    identity.clone()
}
