//! Session, profile and observable auth state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role name that grants access to the dashboard.
pub const ADMIN_ROLE: &str = "admin";

/// Email and secret for a single sign-in or sign-up call.
///
/// Never stored beyond the call and never printed.
#[derive(Clone)]
pub struct Credential {
    pub email: String,
    pub secret: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Provider-issued session, cached by the session manager.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Subject (user) ID the session belongs to.
    pub subject_id: String,
    /// Provider-opaque access token.
    pub access_token: String,
    /// Refresh token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// RFC 3339 expiry timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl Session {
    /// Create a session with only the subject and access token set.
    pub fn new(subject_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            access_token: access_token.into(),
            refresh_token: None,
            email: None,
            expires_at: None,
        }
    }

    /// Parsed expiry. An unparseable timestamp reads as already expired.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.expires_at.as_ref()?;
        Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    /// Returns true if `expires_at` is set and already in the past.
    pub fn is_expired(&self) -> bool {
        self.expires_at_utc()
            .is_some_and(|expires_at| expires_at <= Utc::now())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subject_id", &self.subject_id)
            .field("access_token", &"<redacted>")
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authorization role stored on a profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Role {
    Admin,
    /// Any other role, kept verbatim.
    Other(String),
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => ADMIN_ROLE,
            Role::Other(name) => name,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Other(String::new())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        if value == ADMIN_ROLE {
            Role::Admin
        } else {
            Role::Other(value.to_string())
        }
    }
}

impl From<Option<String>> for Role {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Role::from).unwrap_or_default()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level record for a subject, keyed by subject ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "id")]
    pub subject_id: String,
    #[serde(default, alias = "full_name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Profile {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: None,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Externally observable session state.
///
/// A settled state (`is_loading == false`) always reflects the most recently
/// applied provider event; when it carries a session, a profile fetch for
/// that session has completed (the profile may still be absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub is_loading: bool,
}

impl AuthState {
    /// State at process start, before any lookup has resolved.
    pub fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            is_loading: true,
        }
    }

    /// Session applied, profile fetch outstanding.
    pub fn pending(session: Session) -> Self {
        Self {
            session: Some(session),
            profile: None,
            is_loading: true,
        }
    }

    pub fn settled(session: Option<Session>, profile: Option<Profile>) -> Self {
        Self {
            session,
            profile,
            is_loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// True only for a settled state holding a session and an admin profile.
    pub fn is_admin(&self) -> bool {
        !self.is_loading
            && self.session.is_some()
            && self.profile.as_ref().is_some_and(Profile::is_admin)
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.subject_id.as_str())
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Kind of provider-pushed session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// A session change pushed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(SessionEvent::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(SessionEvent::SignedOut, None)
    }
}

/// Options forwarded verbatim to the provider on sign-up.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpOptions {
    /// Where the confirmation email should send the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_redirect_to: Option<String>,
    /// Extra user metadata.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("customer"), Role::Other("customer".to_string()));
        assert_eq!(Role::from("Admin"), Role::Other("Admin".to_string()));
    }

    #[test]
    fn test_profile_deserializes_profile_row() {
        let row = r#"{"id":"user-1","full_name":"Ana","role":"admin","created_at":"2024-01-01"}"#;
        let profile: Profile = serde_json::from_str(row).unwrap();
        assert_eq!(profile.subject_id, "user-1");
        assert_eq!(profile.display_name.as_deref(), Some("Ana"));
        assert!(profile.is_admin());
    }

    #[test]
    fn test_profile_null_or_missing_role_is_not_admin() {
        let null_role: Profile = serde_json::from_str(r#"{"id":"u","role":null}"#).unwrap();
        assert!(!null_role.is_admin());

        let missing: Profile = serde_json::from_str(r#"{"id":"u"}"#).unwrap();
        assert_eq!(missing.role, Role::default());
    }

    #[test]
    fn test_role_serializes_as_plain_string() {
        let profile = Profile::new("u", Role::Other("customer".to_string()));
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["role"], "customer");
        assert_eq!(json["id"], "u");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::new("admin@x.com", "hunter2");
        assert!(!format!("{:?}", credential).contains("hunter2"));

        let session = Session::new("u", "token-abc");
        assert!(!format!("{:?}", session).contains("token-abc"));
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("u", "t");
        assert!(!session.is_expired());

        session.expires_at = Some((chrono::Utc::now() - chrono::Duration::minutes(1)).to_rfc3339());
        assert!(session.is_expired());

        session.expires_at = Some((chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339());
        assert!(!session.is_expired());

        session.expires_at = Some("garbage".to_string());
        assert!(session.is_expired());
    }

    #[test]
    fn test_auth_state_is_admin_requires_settled_admin_session() {
        let session = Session::new("u", "t");
        let admin = Profile::new("u", Role::Admin);

        assert!(AuthState::settled(Some(session.clone()), Some(admin.clone())).is_admin());
        assert!(!AuthState::settled(None, Some(admin.clone())).is_admin());
        assert!(!AuthState::settled(Some(session.clone()), None).is_admin());
        assert!(!AuthState {
            session: Some(session),
            profile: Some(admin),
            is_loading: true,
        }
        .is_admin());
    }

    #[test]
    fn test_initial_state() {
        let state = AuthState::initial();
        assert!(state.is_loading);
        assert!(state.session.is_none());
        assert!(state.profile.is_none());
        assert_eq!(state, AuthState::default());
    }
}
