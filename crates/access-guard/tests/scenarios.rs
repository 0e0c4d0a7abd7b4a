//! End-to-end guard scenarios against a real session manager with
//! in-memory collaborators.

use access_guard::{decide, AccessGuard, GuardDecision, GuardRoutes, RouteSurface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront_auth::{
    AuthError, AuthResult, AuthState, IdentityProvider, Profile, ProfileStore, Role, Session,
    SessionChange, SessionManager, SignUpOptions, TracingNotifier,
};
use tokio::sync::broadcast;

struct FakeProvider {
    events: broadcast::Sender<SessionChange>,
    accounts: HashMap<String, Session>,
    sign_outs: AtomicUsize,
}

impl FakeProvider {
    fn new(accounts: &[(&str, &str)]) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            accounts: accounts
                .iter()
                .map(|(email, id)| (email.to_string(), Session::new(*id, "token")))
                .collect(),
            sign_outs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_current_session(&self) -> AuthResult<Option<Session>> {
        Ok(None)
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, secret: &str) -> AuthResult<Session> {
        match self.accounts.get(email) {
            Some(session) if secret == "secret" => {
                let _ = self.events.send(SessionChange::signed_in(session.clone()));
                Ok(session.clone())
            }
            _ => Err(AuthError::InvalidCredentials(
                "Invalid login credentials".to_string(),
            )),
        }
    }

    async fn sign_up(&self, _: &str, _: &str, _: &SignUpOptions) -> AuthResult<()> {
        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(SessionChange::signed_out());
        Ok(())
    }
}

struct FakeProfiles(HashMap<String, Profile>);

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn get_profile_by_subject_id(&self, subject_id: &str) -> AuthResult<Option<Profile>> {
        Ok(self.0.get(subject_id).cloned())
    }
}

#[derive(Default)]
struct RecordingSurface {
    navigations: Mutex<Vec<String>>,
    renders: AtomicUsize,
}

impl RouteSurface for RecordingSurface {
    fn navigate(&self, route: &str) {
        self.navigations.lock().unwrap().push(route.to_string());
    }

    fn render_protected(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn show_waiting(&self) {}
}

fn setup(role: &str) -> (Arc<FakeProvider>, Arc<SessionManager>) {
    let provider = Arc::new(FakeProvider::new(&[("admin@x.com", "user-1")]));
    let profiles = Arc::new(FakeProfiles(HashMap::from([(
        "user-1".to_string(),
        Profile::new("user-1", Role::from(role)),
    )])));
    let manager = SessionManager::new(provider.clone(), profiles, Arc::new(TracingNotifier));
    (provider, manager)
}

async fn settle(manager: &SessionManager) -> AuthState {
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.wait_until_settled().await
}

#[tokio::test]
async fn no_session_redirects_to_login() {
    let (_provider, manager) = setup("admin");
    let surface = Arc::new(RecordingSurface::default());
    let mut guard = AccessGuard::new(manager.subscribe(), surface.clone(), GuardRoutes::default());

    assert_eq!(guard.evaluate(), GuardDecision::Wait);

    manager.initialize().await.unwrap();
    assert_eq!(manager.current(), AuthState::settled(None, None));

    assert_eq!(guard.evaluate(), GuardDecision::Redirect);
    assert_eq!(*surface.navigations.lock().unwrap(), vec!["/login"]);
    assert_eq!(surface.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn admin_sign_in_renders_children() {
    let (_provider, manager) = setup("admin");
    manager.initialize().await.unwrap();

    let surface = Arc::new(RecordingSurface::default());
    let mut guard = AccessGuard::new(manager.subscribe(), surface.clone(), GuardRoutes::default());
    assert_eq!(guard.evaluate(), GuardDecision::Redirect);
    let guard_task = tokio::spawn(guard.run());

    let outcome = manager.sign_in("admin@x.com", "secret").await;
    assert!(outcome.is_success());
    assert_eq!(outcome.profile.unwrap().role, Role::Admin);

    let state = settle(&manager).await;
    assert_eq!(decide(&state), GuardDecision::Render);
    assert!(surface.renders.load(Ordering::SeqCst) >= 1);
    assert_eq!(*surface.navigations.lock().unwrap(), vec!["/login"]);

    manager.shutdown();
    drop(manager);
    assert_eq!(guard_task.await.unwrap(), GuardDecision::Render);
}

#[tokio::test]
async fn customer_sign_in_is_revoked_and_redirected() {
    let (provider, manager) = setup("customer");
    manager.initialize().await.unwrap();

    let surface = Arc::new(RecordingSurface::default());
    let mut guard = AccessGuard::new(manager.subscribe(), surface.clone(), GuardRoutes::default());
    assert_eq!(guard.evaluate(), GuardDecision::Redirect);
    let guard_task = tokio::spawn(guard.run());

    let outcome = manager.sign_in("admin@x.com", "secret").await;
    assert!(matches!(outcome.error, Some(AuthError::AccessDenied)));

    let state = settle(&manager).await;
    assert_eq!(state, AuthState::settled(None, None));
    assert_eq!(provider.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(surface.renders.load(Ordering::SeqCst), 0);

    manager.shutdown();
    drop(manager);
    assert_eq!(guard_task.await.unwrap(), GuardDecision::Redirect);
}
