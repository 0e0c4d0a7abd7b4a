//! Authentication error types.

use thiserror::Error;

/// Message shown when valid credentials belong to a non-admin profile.
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied. Administrators only.";

/// Authentication error type.
///
/// Provider failures are reported to the user. `ProfileFetch` is logged and
/// swallowed. `AccessDenied` is always paired with a session revocation.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Identity provider rejected the request
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Profile store lookup failed
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Valid credentials, but the profile role is not admin
    #[error("Access denied. Administrators only.")]
    AccessDenied,

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// No session available
    #[error("Not logged in")]
    NotLoggedIn,

    /// `initialize` was called more than once
    #[error("Session manager already initialized")]
    AlreadyInitialized,

    /// Invalid state transition in the session phase FSM
    #[error("Invalid session phase transition: {0}")]
    InvalidStateTransition(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable => true,
            AuthError::Timeout => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// Returns true for the role-based denial that follows a successful
    /// credential check.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, AuthError::AccessDenied)
    }

    /// Message suitable for a user-facing notification.
    ///
    /// Returns `None` when the provider answered without any text.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AuthError::InvalidCredentials(message) | AuthError::Provider(message) => {
                let trimmed = message.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
