//! Manager lifecycle plus the sign-up and sign-out paths.

use super::harness::{admin_profile, session, TestHarness};
use crate::error::AuthError;
use crate::notifier::{Notification, Severity};
use crate::session_fsm::SessionPhase;
use crate::types::{AuthState, SessionChange, SignUpOptions};
use std::time::Duration;

#[tokio::test]
async fn initialize_twice_is_rejected() {
    let h = TestHarness::new();
    h.manager.initialize().await.unwrap();

    let second = h.manager.initialize().await;
    assert!(matches!(second, Err(AuthError::AlreadyInitialized)));
    assert_eq!(h.provider.subscriber_count(), 1);
}

#[tokio::test]
async fn failed_lookup_settles_signed_out_silently() {
    let h = TestHarness::new();
    h.provider.fail_lookup("network down");

    h.manager.initialize().await.unwrap();

    assert_eq!(h.manager.current(), AuthState::settled(None, None));
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn shutdown_releases_subscription() {
    let h = TestHarness::new();
    h.profiles.insert(admin_profile("admin-1"));
    h.manager.initialize().await.unwrap();
    assert_eq!(h.provider.subscriber_count(), 1);

    h.manager.shutdown();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.provider.subscriber_count(), 0);

    // Changes after shutdown are not applied.
    h.provider.emit(SessionChange::signed_in(session("admin-1")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.manager.current(), AuthState::settled(None, None));
}

#[tokio::test]
async fn shutdown_lets_in_flight_change_settle() {
    let h = TestHarness::new();
    h.profiles.insert(admin_profile("admin-1"));
    h.profiles.set_delay("admin-1", Duration::from_millis(40));
    h.manager.initialize().await.unwrap();

    h.provider.emit(SessionChange::signed_in(session("admin-1")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.manager.current().is_loading);

    h.manager.shutdown();

    let state = tokio::time::timeout(Duration::from_millis(500), h.manager.wait_until_settled())
        .await
        .expect("state settles after shutdown");
    assert_eq!(
        state,
        AuthState::settled(Some(session("admin-1")), Some(admin_profile("admin-1")))
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.provider.subscriber_count(), 0);
}

#[tokio::test]
async fn dropping_manager_releases_subscription() {
    let TestHarness {
        provider, manager, ..
    } = TestHarness::new();
    manager.initialize().await.unwrap();
    assert_eq!(provider.subscriber_count(), 1);

    drop(manager);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(provider.subscriber_count(), 0);
}

#[tokio::test]
async fn subscribers_are_pushed_changes() {
    let h = TestHarness::new();
    let mut rx = h.manager.subscribe();
    assert!(rx.borrow().is_loading);

    h.manager.initialize().await.unwrap();

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), AuthState::settled(None, None));
}

#[tokio::test]
async fn sign_out_clears_state_through_provider_event() {
    let h = TestHarness::with_accounts();
    h.manager.initialize().await.unwrap();
    h.manager.sign_in("admin@x.com", "secret").await;
    assert!(h.settle().await.is_admin());

    let outcome = h.manager.sign_out().await;

    assert!(outcome.error.is_none());
    assert_eq!(h.provider.sign_out_calls(), 1);
    assert_eq!(h.settle().await, AuthState::settled(None, None));
    assert_eq!(h.manager.phase(), SessionPhase::Unauthenticated);
    assert_eq!(
        h.notifier.last(),
        Some(Notification::info("Logged out successfully", ""))
    );
}

#[tokio::test]
async fn failed_sign_out_notifies_and_keeps_session() {
    let h = TestHarness::with_accounts();
    h.manager.initialize().await.unwrap();
    h.manager.sign_in("admin@x.com", "secret").await;
    let admin_state = h.settle().await;

    h.provider.fail_sign_out("network down");
    let outcome = h.manager.sign_out().await;

    assert!(matches!(outcome.error, Some(AuthError::Provider(_))));
    assert_eq!(
        h.notifier.last(),
        Some(Notification::destructive("Sign out Failed", "network down"))
    );
    assert_eq!(h.settle().await, admin_state);
}

#[tokio::test]
async fn sign_up_never_touches_state() {
    let h = TestHarness::new();
    h.manager.initialize().await.unwrap();
    let before = h.manager.current();

    let outcome = h
        .manager
        .sign_up("new@x.com", "secret", SignUpOptions::default())
        .await;

    assert!(outcome.error.is_none());
    assert_eq!(h.manager.current(), before);
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn failed_sign_up_notifies_without_state_change() {
    let h = TestHarness::new();
    h.provider.fail_sign_up("User already registered");
    h.manager.initialize().await.unwrap();
    let before = h.manager.current();

    let outcome = h
        .manager
        .sign_up("taken@x.com", "secret", SignUpOptions::default())
        .await;

    assert!(matches!(outcome.error, Some(AuthError::Provider(_))));
    assert_eq!(h.manager.current(), before);
    assert_eq!(h.notifier.count(Severity::Destructive), 1);
    assert_eq!(
        h.notifier.last(),
        Some(Notification::destructive(
            "Sign up Failed",
            "User already registered"
        ))
    );
}

#[tokio::test]
async fn blank_sign_up_error_uses_generic_message() {
    let h = TestHarness::new();
    h.provider.fail_sign_up(" ");
    h.manager.initialize().await.unwrap();

    h.manager
        .sign_up("x@x.com", "secret", SignUpOptions::default())
        .await;

    assert_eq!(
        h.notifier.last().map(|n| n.description),
        Some("Something went wrong".to_string())
    );
}
