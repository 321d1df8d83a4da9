//! Identity models for the session adapter and API.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Profile fields as reported by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Full display name (e.g. "Ada Lovelace")
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Provider-side session established by sign-in.
///
/// Carries bearer tokens, so it deliberately has no `Debug` impl.
#[derive(Clone)]
pub struct ProviderSession {
    /// Stable provider-issued user ID
    pub uid: String,
    /// Short-lived ID token
    pub id_token: String,
    /// Long-lived refresh token
    pub refresh_token: String,
    pub profile: ProviderProfile,
}

/// The signed-in actor, as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Identity {
    pub uid: String,
    /// First name, or the email local part when no name is known
    pub display_name: String,
    pub email: String,
    pub photo_url: String,
}

impl Identity {
    /// Derive the identity from a provider session.
    pub fn from_session(session: &ProviderSession, placeholder_photo_url: &str) -> Self {
        let profile = &session.profile;
        let email = profile.email.clone().unwrap_or_default();

        let display_name = profile
            .display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .map(str::to_string)
            .unwrap_or_else(|| email_local_part(&email).to_string());

        let photo_url = profile
            .photo_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| placeholder_photo_url.to_string());

        Self {
            uid: session.uid.clone(),
            display_name,
            email,
            photo_url,
        }
    }
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDER: &str = "https://via.placeholder.com/150";

    fn session(name: Option<&str>, email: Option<&str>, photo: Option<&str>) -> ProviderSession {
        ProviderSession {
            uid: "u1".to_string(),
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            profile: ProviderProfile {
                display_name: name.map(str::to_string),
                email: email.map(str::to_string),
                photo_url: photo.map(str::to_string),
            },
        }
    }

    #[test]
    fn display_name_is_first_token() {
        let identity = Identity::from_session(
            &session(Some("Ada  Lovelace"), Some("ada@example.com"), None),
            PLACEHOLDER,
        );
        assert_eq!(identity.display_name, "Ada");
        assert_eq!(identity.uid, "u1");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let identity =
            Identity::from_session(&session(None, Some("grace@example.com"), None), PLACEHOLDER);
        assert_eq!(identity.display_name, "grace");

        let blank =
            Identity::from_session(&session(Some("   "), Some("alan@example.com"), None), PLACEHOLDER);
        assert_eq!(blank.display_name, "alan");
    }

    #[test]
    fn photo_falls_back_to_placeholder() {
        let identity = Identity::from_session(&session(Some("Ada"), None, None), PLACEHOLDER);
        assert_eq!(identity.photo_url, PLACEHOLDER);
        assert_eq!(identity.email, "");

        let with_photo = Identity::from_session(
            &session(Some("Ada"), None, Some("https://example.com/a.png")),
            PLACEHOLDER,
        );
        assert_eq!(with_photo.photo_url, "https://example.com/a.png");
    }
}
