//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use crate::time_utils::DueZone;
use std::env;
use std::str::FromStr;

/// Fallback avatar shown when the identity provider has no photo.
pub const DEFAULT_PLACEHOLDER_PHOTO_URL: &str = "https://via.placeholder.com/150";

/// Which document store backs the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Firestore,
    /// In-process store; data is lost on exit.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("TASK_STORE", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase Web API key used for the Auth REST endpoints
    pub firebase_api_key: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Interface the HTTP bridge binds to
    pub bind_host: String,
    /// Server port
    pub port: u16,
    /// Avatar URL used when the provider supplies none
    pub placeholder_photo_url: String,
    /// Zone for due date input and display
    pub due_zone: DueZone,
    /// Task store backend
    pub task_store: StoreBackend,
    /// Firebase Auth emulator host (`host:port`), if any
    pub auth_emulator_host: Option<String>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: "test-api-key".to_string(),
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            bind_host: "127.0.0.1".to_string(),
            port: 8080,
            placeholder_photo_url: DEFAULT_PLACEHOLDER_PHOTO_URL.to_string(),
            due_zone: DueZone::Utc,
            task_store: StoreBackend::Memory,
            auth_emulator_host: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let due_zone = match env::var("DUE_TIME_ZONE") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("DUE_TIME_ZONE", raw))?,
            Err(_) => DueZone::default(),
        };

        let task_store = match env::var("TASK_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::default(),
        };

        Ok(Self {
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            bind_host: env::var("BIND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            placeholder_photo_url: env::var("PLACEHOLDER_PHOTO_URL")
                .unwrap_or_else(|_| DEFAULT_PLACEHOLDER_PHOTO_URL.to_string()),
            due_zone,
            task_store,
            auth_emulator_host: env::var("FIREBASE_AUTH_EMULATOR_HOST").ok(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
