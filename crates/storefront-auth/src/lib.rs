//! Admin authentication for the HotPhone storefront dashboard.
//!
//! This crate provides:
//! - A process-wide session manager that converges the initial session
//!   lookup and provider change events into one observable auth state
//! - Admin-only sign-in: non-admin credentials are revoked immediately
//! - Supabase adapters for the identity provider and the profile store,
//!   with the session kept in secure storage and refreshed before expiry
//! - An FSM-based summary of the session phase

mod error;
mod notifier;
mod provider;
mod session;
mod session_fsm;
mod supabase_client;
mod types;

#[cfg(test)]
mod tests;

pub use error::{AuthError, AuthResult, ACCESS_DENIED_MESSAGE};
pub use notifier::{Notification, Notifier, Severity, TracingNotifier};
pub use provider::{IdentityProvider, ProfileStore};
pub use session::{SessionManager, SignInOutcome, SignOutOutcome, SignUpOutcome};
pub use session_fsm::session_machine;
pub use session_fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionPhase};
pub use supabase_client::{SupabaseIdentityProvider, SupabaseProfileStore, DEFAULT_PROFILE_TABLE};
pub use types::{
    AuthState, Credential, Profile, Role, Session, SessionChange, SessionEvent, SignUpOptions,
    ADMIN_ROLE,
};
