//! Collaborator traits consumed by the session manager.

use crate::types::{Profile, Session, SessionChange, SignUpOptions};
use crate::AuthResult;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Hosted identity provider (Supabase Auth in production).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the session the provider currently holds, if any.
    async fn get_current_session(&self) -> AuthResult<Option<Session>>;

    /// Subscribe to session changes for as long as the receiver is alive.
    ///
    /// Dropping the receiver unsubscribes.
    fn on_session_change(&self) -> broadcast::Receiver<SessionChange>;

    /// Exchange email and password for a session.
    async fn sign_in_with_password(&self, email: &str, secret: &str) -> AuthResult<Session>;

    /// Create credentials for a new subject.
    async fn sign_up(&self, email: &str, secret: &str, options: &SignUpOptions) -> AuthResult<()>;

    /// Invalidate the current session.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Lookup of application profiles by subject ID.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Returns `Ok(None)` when no profile row exists for the subject.
    async fn get_profile_by_subject_id(&self, subject_id: &str) -> AuthResult<Option<Profile>>;
}
