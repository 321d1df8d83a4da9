// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity session adapter.
//!
//! The adapter is the only owner of the process-wide session. Everyone
//! else observes it through a [`SessionSubscription`], which yields the
//! current identity immediately and then every change.

use crate::error::AppError;
use crate::models::{Identity, ProviderSession};
use crate::services::identity::{IdentityProvider, SignInCredential};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Bridges the identity provider to the rest of the application.
#[derive(Clone)]
pub struct SessionAdapter {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Arc<dyn IdentityProvider>,
    placeholder_photo_url: String,
    state: watch::Sender<Option<ProviderSession>>,
}

impl SessionAdapter {
    pub fn new(provider: Arc<dyn IdentityProvider>, placeholder_photo_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                provider,
                placeholder_photo_url: placeholder_photo_url.into(),
                state,
            }),
        }
    }

    /// Complete a sign-in and replace the current session.
    ///
    /// On failure the session is left exactly as it was and the error is
    /// returned to the caller. There is no retry.
    pub async fn sign_in(&self, credential: &SignInCredential) -> Result<Identity, AppError> {
        let session = match self.inner.provider.sign_in(credential).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        let identity = Identity::from_session(&session, &self.inner.placeholder_photo_url);
        tracing::info!(uid = %identity.uid, "Signed in");

        self.inner.state.send_replace(Some(session));
        Ok(identity)
    }

    /// End the current session.
    ///
    /// Local state becomes absent immediately. The provider is told in the
    /// background and a failure there is only logged.
    pub fn sign_out(&self) {
        let Some(session) = self.inner.state.send_replace(None) else {
            tracing::debug!("Sign-out requested with no active session");
            return;
        };

        tracing::info!(uid = %session.uid, "Signed out");

        let provider = self.inner.provider.clone();
        tokio::spawn(async move {
            if let Err(e) = provider.sign_out(&session).await {
                tracing::warn!(error = %e, uid = %session.uid, "Provider sign-out failed");
            }
        });
    }

    /// True if a session is currently established.
    pub fn is_signed_in(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    /// Subscribe to identity changes.
    ///
    /// The first call to [`SessionSubscription::next`] returns the current
    /// state. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            inner: Arc::downgrade(&self.inner),
            rx: self.inner.state.subscribe(),
            primed: false,
        }
    }
}

/// Stream of identity notifications for one subscriber.
pub struct SessionSubscription {
    inner: Weak<SessionInner>,
    rx: watch::Receiver<Option<ProviderSession>>,
    primed: bool,
}

impl SessionSubscription {
    /// Wait for the next notification.
    ///
    /// Returns `Some(None)` when signed out, `Some(Some(identity))` when
    /// signed in, and `None` once the adapter is gone.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;

        let session = self.rx.borrow_and_update().clone();
        match session {
            None => Some(None),
            Some(session) => {
                let inner = self.inner.upgrade()?;
                Some(Some(refreshed_identity(&inner, session).await))
            }
        }
    }
}

/// Force a provider reload before deriving the identity, so a profile
/// change made elsewhere (e.g. a new display name) shows up.
async fn refreshed_identity(inner: &SessionInner, cached: ProviderSession) -> Identity {
    let session = match inner.provider.reload(&cached).await {
        Ok(fresh) => {
            // Keep rotated tokens without waking subscribers again. Skip
            // if the session changed while the reload was in flight.
            inner.state.send_if_modified(|current| {
                if let Some(current) = current.as_mut() {
                    if current.uid == fresh.uid && current.id_token == cached.id_token {
                        *current = fresh.clone();
                    }
                }
                false
            });
            fresh
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                uid = %cached.uid,
                "Profile refresh failed, using cached profile"
            );
            cached
        }
    };

    Identity::from_session(&session, &inner.placeholder_photo_url)
}
