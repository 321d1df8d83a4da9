// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider port and the Firebase Authentication REST client.
//!
//! Handles:
//! - Exchanging a Google credential for a Firebase session (`signInWithIdp`)
//! - Forced profile reload (`accounts:lookup`)
//! - ID token refresh when the cached token has expired

use crate::config::Config;
use crate::error::AppError;
use crate::models::{ProviderProfile, ProviderSession};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Credential produced by the interactive Google sign-in flow.
#[derive(Clone, Default)]
pub struct SignInCredential {
    /// Google ID token (preferred)
    pub id_token: Option<String>,
    /// Google OAuth access token
    pub access_token: Option<String>,
}

impl SignInCredential {
    /// Build the `postBody` form expected by `signInWithIdp`.
    fn post_body(&self) -> Result<String, AppError> {
        let (kind, token) = match (&self.id_token, &self.access_token) {
            (Some(token), _) if !token.is_empty() => ("id_token", token),
            (_, Some(token)) if !token.is_empty() => ("access_token", token),
            _ => {
                return Err(AppError::BadRequest(
                    "An ID token or access token is required".to_string(),
                ))
            }
        };

        Ok(format!(
            "{}={}&providerId={}",
            kind,
            urlencoding::encode(token),
            GOOGLE_PROVIDER_ID
        ))
    }
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Complete a sign-in with a credential from the interactive flow.
    async fn sign_in(&self, credential: &SignInCredential) -> Result<ProviderSession, AppError>;

    /// Re-read the provider's profile for a session, bypassing any cache.
    ///
    /// May return a session with rotated tokens.
    async fn reload(&self, session: &ProviderSession) -> Result<ProviderSession, AppError>;

    /// Tell the provider the session ended. Local state never depends on it.
    async fn sign_out(&self, _session: &ProviderSession) -> Result<(), AppError> {
        Ok(())
    }
}

/// Firebase Authentication REST client.
#[derive(Clone)]
pub struct FirebaseAuthProvider {
    http: reqwest::Client,
    api_key: String,
    identity_base_url: String,
    token_base_url: String,
    request_uri: String,
}

impl FirebaseAuthProvider {
    /// Create a client from configuration. Uses the Auth emulator when
    /// `FIREBASE_AUTH_EMULATOR_HOST` is configured.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building identity provider HTTP client")?;

        let (identity_base_url, token_base_url) = match &config.auth_emulator_host {
            Some(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                (
                    format!("http://{}/identitytoolkit.googleapis.com/v1", host),
                    format!("http://{}/securetoken.googleapis.com/v1", host),
                )
            }
            None => (
                IDENTITY_TOOLKIT_URL.to_string(),
                SECURE_TOKEN_URL.to_string(),
            ),
        };

        Ok(Self {
            http,
            api_key: config.firebase_api_key.clone(),
            identity_base_url,
            token_base_url,
            request_uri: config.frontend_url.clone(),
        })
    }

    async fn lookup(&self, id_token: &str) -> Result<ProviderProfile, AppError> {
        let url = format!("{}/accounts:lookup", self.identity_base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Profile lookup failed: {}", e)))?;

        let body: LookupResponse = check_response_json(response).await?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AppError::AuthFailed("USER_NOT_FOUND".to_string()))?;

        Ok(ProviderProfile {
            display_name: user.display_name,
            email: user.email,
            photo_url: user.photo_url,
        })
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let url = format!("{}/token", self.token_base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Token refresh request failed: {}", e)))?;

        check_response_json(response).await
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthProvider {
    async fn sign_in(&self, credential: &SignInCredential) -> Result<ProviderSession, AppError> {
        let request = SignInWithIdpRequest {
            post_body: credential.post_body()?,
            request_uri: &self.request_uri,
            return_idp_credential: true,
            return_secure_token: true,
        };

        let url = format!("{}/accounts:signInWithIdp", self.identity_base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Sign-in request failed: {}", e)))?;

        let body: SignInWithIdpResponse = check_response_json(response).await?;
        tracing::info!(uid = %body.local_id, "Firebase sign-in succeeded");

        Ok(body.into_session())
    }

    async fn reload(&self, session: &ProviderSession) -> Result<ProviderSession, AppError> {
        match self.lookup(&session.id_token).await {
            Ok(profile) => Ok(ProviderSession {
                profile,
                ..session.clone()
            }),
            Err(AppError::AuthFailed(msg)) if is_token_expired(&msg) => {
                tracing::debug!(uid = %session.uid, "ID token expired, refreshing");
                let tokens = self.refresh_tokens(&session.refresh_token).await?;
                let profile = self.lookup(&tokens.id_token).await?;
                Ok(ProviderSession {
                    uid: session.uid.clone(),
                    id_token: tokens.id_token,
                    refresh_token: tokens.refresh_token,
                    profile,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    email: Option<String>,
    display_name: Option<String>,
    full_name: Option<String>,
    photo_url: Option<String>,
}

impl SignInWithIdpResponse {
    fn into_session(self) -> ProviderSession {
        ProviderSession {
            uid: self.local_id,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            profile: ProviderProfile {
                display_name: self.display_name.or(self.full_name),
                email: self.email,
                photo_url: self.photo_url,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Check response status and parse the JSON body.
///
/// 4xx responses carry a Firebase error code (e.g. `INVALID_IDP_RESPONSE`)
/// and map to `AuthFailed`; anything else is a provider failure.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Invalid response JSON: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();
    let message = provider_error_message(&body).unwrap_or_else(|| format!("HTTP {}", status));

    if status.is_client_error() {
        Err(AppError::AuthFailed(message))
    } else {
        Err(AppError::IdentityProvider(format!("HTTP {}: {}", status, message)))
    }
}

fn provider_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

fn is_token_expired(message: &str) -> bool {
    message.starts_with("TOKEN_EXPIRED") || message.starts_with("INVALID_ID_TOKEN")
}
