//! Admin-only sign-in.
//!
//! Valid credentials are necessary but not sufficient: only an admin
//! profile keeps its session. Everything else is revoked on the spot.

use super::harness::{admin_profile, session, TestHarness, INVALID_LOGIN};
use crate::error::{AuthError, ACCESS_DENIED_MESSAGE};
use crate::notifier::{Notification, Severity};
use crate::session_fsm::SessionPhase;
use crate::types::{AuthState, Role};

#[tokio::test]
async fn admin_sign_in_commits_session_and_profile() {
    let h = TestHarness::with_accounts();
    h.manager.initialize().await.unwrap();

    let outcome = h.manager.sign_in("admin@x.com", "secret").await;

    assert!(outcome.is_success());
    let profile = outcome.profile.unwrap();
    assert_eq!(profile.role, Role::Admin);

    let state = h.manager.current();
    assert!(state.is_admin());
    assert_eq!(state.subject_id(), Some("admin-1"));
    assert_eq!(h.manager.phase(), SessionPhase::AuthenticatedAdmin);

    assert_eq!(
        h.notifier.last(),
        Some(Notification::success("Login successful", "Welcome back!"))
    );
    assert_eq!(h.provider.sign_out_calls(), 0);

    // The provider's own SignedIn event converges to the same state.
    let state = h.settle().await;
    assert_eq!(
        state,
        AuthState::settled(Some(session("admin-1")), Some(admin_profile("admin-1")))
    );
}

#[tokio::test]
async fn non_admin_sign_in_is_revoked_exactly_once() {
    let h = TestHarness::with_accounts();
    h.manager.initialize().await.unwrap();

    let outcome = h.manager.sign_in("shopper@x.com", "secret").await;

    let error = outcome.error.unwrap();
    assert!(matches!(error, AuthError::AccessDenied));
    assert!(error.is_policy_rejection());
    assert!(outcome.profile.is_none());
    assert_eq!(h.provider.sign_out_calls(), 1);

    assert_eq!(h.settle().await, AuthState::settled(None, None));
    assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
    assert_eq!(h.provider.sign_out_calls(), 1);

    assert_eq!(
        h.notifier.last(),
        Some(Notification::destructive("Login Failed", ACCESS_DENIED_MESSAGE))
    );
    assert_eq!(h.notifier.count(Severity::Success), 0);
}

#[tokio::test]
async fn non_admin_revocation_settles_without_provider_events() {
    let h = TestHarness::with_accounts();
    h.provider.set_emit_events(false);
    h.manager.initialize().await.unwrap();

    let outcome = h.manager.sign_in("shopper@x.com", "secret").await;

    assert!(matches!(outcome.error, Some(AuthError::AccessDenied)));
    assert_eq!(h.manager.current(), AuthState::settled(None, None));
    assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn sign_in_without_profile_row_is_access_denied() {
    let h = TestHarness::new();
    h.provider.add_account("ghost@x.com", "secret", session("ghost-1"));
    h.manager.initialize().await.unwrap();

    let outcome = h.manager.sign_in("ghost@x.com", "secret").await;

    assert!(matches!(outcome.error, Some(AuthError::AccessDenied)));
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert_eq!(h.settle().await, AuthState::settled(None, None));
}

#[tokio::test]
async fn sign_in_with_unreachable_profile_store_is_access_denied() {
    let h = TestHarness::with_accounts();
    h.profiles.fail_for("admin-1");
    h.manager.initialize().await.unwrap();

    let outcome = h.manager.sign_in("admin@x.com", "secret").await;

    assert!(matches!(outcome.error, Some(AuthError::AccessDenied)));
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert_eq!(h.settle().await, AuthState::settled(None, None));
}

#[tokio::test]
async fn invalid_credentials_leave_state_untouched() {
    let h = TestHarness::with_accounts();
    h.manager.initialize().await.unwrap();
    let before = h.manager.current();

    let outcome = h.manager.sign_in("admin@x.com", "wrong").await;

    assert!(matches!(
        outcome.error,
        Some(AuthError::InvalidCredentials(_))
    ));
    assert!(!outcome.error.as_ref().unwrap().is_policy_rejection());
    assert_eq!(h.manager.current(), before);
    assert_eq!(h.provider.sign_out_calls(), 0);
    assert_eq!(h.profiles.calls(), 0);

    assert_eq!(
        h.notifier.last(),
        Some(Notification::destructive("Login Failed", INVALID_LOGIN))
    );
}

#[tokio::test]
async fn blank_provider_message_falls_back_to_hint() {
    let h = TestHarness::with_accounts();
    h.provider.set_sign_in_message("");
    h.manager.initialize().await.unwrap();

    h.manager.sign_in("nobody@x.com", "secret").await;

    assert_eq!(
        h.notifier.last(),
        Some(Notification::destructive(
            "Login Failed",
            "Check your email and password."
        ))
    );
}

#[tokio::test]
async fn invalid_credentials_while_admin_keeps_admin_session() {
    let h = TestHarness::with_accounts();
    h.manager.initialize().await.unwrap();
    h.manager.sign_in("admin@x.com", "secret").await;
    let admin_state = h.settle().await;
    assert!(admin_state.is_admin());

    let outcome = h.manager.sign_in("admin@x.com", "typo").await;

    assert!(outcome.error.is_some());
    assert_eq!(h.settle().await, admin_state);
    assert_eq!(h.manager.phase(), SessionPhase::AuthenticatedAdmin);
}
