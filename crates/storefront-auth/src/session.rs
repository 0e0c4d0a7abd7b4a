//! Session manager: the single source of truth for who is signed in and
//! whether they are an admin.
//!
//! Two inputs race against each other: the initial session lookup and the
//! provider's change-event stream. Both go through `apply_session`, which
//! stamps every application with a generation ticket. Only the newest ticket
//! may commit, so a slow profile fetch started for an older event can never
//! overwrite a newer state, and `is_loading` stays true exactly while the
//! newest fetch is outstanding.
//!
//! Commits replace the whole [`AuthState`] inside
//! `watch::Sender::send_if_modified`, which makes the ticket check and the
//! write a single step for every subscriber.

use crate::error::{AuthError, AuthResult, ACCESS_DENIED_MESSAGE};
use crate::notifier::{Notification, Notifier};
use crate::provider::{IdentityProvider, ProfileStore};
use crate::session_fsm::{input_for, SessionMachine, SessionMachineInput, SessionPhase};
use crate::types::{AuthState, Profile, Session, SessionChange, SignUpOptions};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, info, warn};

const LOGIN_FAILED_TITLE: &str = "Login Failed";
const LOGIN_FAILED_HINT: &str = "Check your email and password.";
const SIGN_UP_FAILED_TITLE: &str = "Sign up Failed";
const SIGN_OUT_FAILED_TITLE: &str = "Sign out Failed";
const GENERIC_FAILURE_HINT: &str = "Something went wrong";
const SIGNED_OUT_TITLE: &str = "Logged out successfully";

/// Result of [`SessionManager::sign_up`].
#[derive(Debug)]
pub struct SignUpOutcome {
    pub error: Option<AuthError>,
}

/// Result of [`SessionManager::sign_in`].
///
/// `profile` is only set when the sign-in was admitted.
#[derive(Debug)]
pub struct SignInOutcome {
    pub error: Option<AuthError>,
    pub profile: Option<Profile>,
}

impl SignInOutcome {
    fn failed(error: AuthError) -> Self {
        Self {
            error: Some(error),
            profile: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of [`SessionManager::sign_out`].
#[derive(Debug)]
pub struct SignOutOutcome {
    pub error: Option<AuthError>,
}

/// Process-wide session manager.
///
/// Construct once at application start, call [`initialize`](Self::initialize),
/// hand `Arc` clones to consumers, and call [`shutdown`](Self::shutdown) when
/// the owning scope ends. The manager is the only writer of [`AuthState`];
/// everything else reads snapshots or subscribes.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
    state_tx: watch::Sender<AuthState>,
    /// Ticket of the most recent state application.
    generation: AtomicU64,
    fsm: Mutex<SessionMachine>,
    initialized: AtomicBool,
    /// Stops the task draining the provider's change events. Dropping it
    /// stops the task as well.
    listener: Mutex<Option<oneshot::Sender<()>>>,
}

impl SessionManager {
    /// Create a new session manager. State starts as loading with no session.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(AuthState::initial());

        Arc::new(Self {
            provider,
            profiles,
            notifier,
            state_tx,
            generation: AtomicU64::new(0),
            fsm: Mutex::new(SessionMachine::new()),
            initialized: AtomicBool::new(false),
            listener: Mutex::new(None),
        })
    }

    /// Subscribe to provider session changes and resolve the initial session.
    ///
    /// The change listener is running before the lookup starts, so an event
    /// the provider emits while the lookup is in flight is not lost. Both
    /// paths go through the same convergence routine; whichever is applied
    /// last wins. A failed lookup counts as "no session".
    pub async fn initialize(self: &Arc<Self>) -> AuthResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(AuthError::AlreadyInitialized);
        }

        let events = self.provider.on_session_change();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(listen_for_changes(Arc::downgrade(self), events, shutdown_rx));
        *self.listener.lock() = Some(shutdown_tx);

        let session = match self.provider.get_current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Initial session lookup failed, continuing signed out");
                None
            }
        };

        info!(
            has_session = session.is_some(),
            "Initial session lookup resolved"
        );
        self.apply_session(session).await;

        Ok(())
    }

    /// Stop listening for provider session changes.
    ///
    /// A change already being applied runs to completion, so the state is
    /// never left loading.
    pub fn shutdown(&self) {
        if let Some(shutdown_tx) = self.listener.lock().take() {
            let _ = shutdown_tx.send(());
            info!("Session change listener stopping");
        }
    }

    /// Current state snapshot.
    pub fn current(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Current session phase.
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.fsm.lock().state())
    }

    /// Wait for the first state with no profile fetch outstanding.
    pub async fn wait_until_settled(&self) -> AuthState {
        let mut rx = self.state_tx.subscribe();
        let settled = rx
            .wait_for(|state| !state.is_loading)
            .await
            .map(|state| AuthState::clone(&state));
        settled.unwrap_or_else(|_| self.current())
    }

    /// Create credentials with the identity provider.
    ///
    /// Never touches the auth state: a failed sign-up is not a session change,
    /// and a successful one is reported by the provider's own event.
    pub async fn sign_up(&self, email: &str, secret: &str, options: SignUpOptions) -> SignUpOutcome {
        match self.provider.sign_up(email, secret, &options).await {
            Ok(()) => {
                info!(email = %email, "Sign up accepted");
                SignUpOutcome { error: None }
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Sign up failed");
                self.notify_failure(SIGN_UP_FAILED_TITLE, &e, GENERIC_FAILURE_HINT);
                SignUpOutcome { error: Some(e) }
            }
        }
    }

    /// Sign in with email and password, admitting admins only.
    ///
    /// - Provider error: notify and return it. Auth state is untouched.
    /// - Admin profile: commit session and profile, return the profile.
    /// - Any other profile, or none: revoke the session with the provider,
    ///   settle signed out, return [`AuthError::AccessDenied`].
    pub async fn sign_in(&self, email: &str, secret: &str) -> SignInOutcome {
        debug!(email = %email, "Attempting email/password login");

        let session = match self.provider.sign_in_with_password(email, secret).await {
            Ok(session) => session,
            Err(e) => {
                warn!(email = %email, error = %e, "Login failed");
                self.notify_failure(LOGIN_FAILED_TITLE, &e, LOGIN_FAILED_HINT);
                return SignInOutcome::failed(e);
            }
        };

        let profile = self.fetch_profile(&session.subject_id).await;

        match profile {
            Some(profile) if profile.is_admin() => {
                let user_id = session.subject_id.clone();
                let ticket = self.next_ticket();
                self.commit(
                    ticket,
                    AuthState::settled(Some(session), Some(profile.clone())),
                );

                info!(user_id = %user_id, "Admin login successful");
                self.notifier
                    .notify(Notification::success("Login successful", "Welcome back!"));

                SignInOutcome {
                    error: None,
                    profile: Some(profile),
                }
            }
            profile => {
                warn!(
                    user_id = %session.subject_id,
                    role = ?profile.as_ref().map(|p| p.role.to_string()),
                    "Login rejected for non-admin profile, revoking session"
                );
                self.revoke_non_admin().await;
                self.notifier.notify(Notification::destructive(
                    LOGIN_FAILED_TITLE,
                    ACCESS_DENIED_MESSAGE,
                ));

                SignInOutcome::failed(AuthError::AccessDenied)
            }
        }
    }

    /// Sign out with the identity provider.
    ///
    /// The provider's `SignedOut` event clears the auth state.
    pub async fn sign_out(&self) -> SignOutOutcome {
        match self.provider.sign_out().await {
            Ok(()) => {
                info!("Signed out");
                self.notifier.notify(Notification::info(SIGNED_OUT_TITLE, ""));
                SignOutOutcome { error: None }
            }
            Err(e) => {
                warn!(error = %e, "Sign out failed");
                self.notify_failure(SIGN_OUT_FAILED_TITLE, &e, GENERIC_FAILURE_HINT);
                SignOutOutcome { error: Some(e) }
            }
        }
    }

    /// Convergence routine for every session source.
    pub(crate) async fn apply_session(&self, session: Option<Session>) {
        let ticket = self.next_ticket();

        let Some(session) = session else {
            self.commit(ticket, AuthState::settled(None, None));
            return;
        };

        self.publish_pending(ticket, session.clone());
        let profile = self.fetch_profile(&session.subject_id).await;
        self.commit(ticket, AuthState::settled(Some(session), profile));
    }

    async fn revoke_non_admin(&self) {
        if let Err(e) = self.transition(&SessionMachineInput::PolicyRejected) {
            debug!(error = %e, "Phase unchanged on policy rejection");
        }

        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "Provider sign-out failed while revoking non-admin session");
        }

        // A pushed SignedOut may already have moved the phase on.
        if let Err(e) = self.transition(&SessionMachineInput::RevocationComplete) {
            debug!(error = %e, "Phase unchanged on revocation");
        }

        self.apply_session(None).await;
    }

    /// Profile lookup that never fails: errors are logged and read as "no profile".
    async fn fetch_profile(&self, subject_id: &str) -> Option<Profile> {
        match self.profiles.get_profile_by_subject_id(subject_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                debug!(user_id = %subject_id, "No profile found");
                None
            }
            Err(e) => {
                warn!(user_id = %subject_id, error = %e, "Error fetching profile");
                None
            }
        }
    }

    fn next_ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    fn publish_pending(&self, ticket: u64, session: Session) {
        self.state_tx.send_if_modified(|state| {
            if !self.is_current(ticket) {
                return false;
            }
            *state = AuthState::pending(session);
            true
        });
    }

    /// Replace the state wholesale if `ticket` is still the newest.
    fn commit(&self, ticket: u64, next: AuthState) -> bool {
        let mut superseded = false;

        self.state_tx.send_if_modified(|state| {
            if !self.is_current(ticket) {
                superseded = true;
                return false;
            }

            if let Err(e) = self.transition(&input_for(&next)) {
                debug!(error = %e, "Phase unchanged on commit");
            }

            if *state == next {
                return false;
            }
            *state = next;
            true
        });

        if superseded {
            debug!(ticket, "Discarding superseded session update");
        }
        !superseded
    }

    /// Transition the phase FSM.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionPhase> {
        let mut fsm = self.fsm.lock();
        let old_phase = SessionPhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in phase {:?}",
                input, old_phase
            ))
        })?;

        let new_phase = SessionPhase::from(fsm.state());
        if old_phase != new_phase {
            debug!(
                old_phase = ?old_phase,
                new_phase = ?new_phase,
                "Session phase transition"
            );
        }

        Ok(new_phase)
    }

    fn notify_failure(&self, title: &str, error: &AuthError, fallback: &str) {
        let description = error
            .user_message()
            .unwrap_or_else(|| fallback.to_string());
        self.notifier
            .notify(Notification::destructive(title, description));
    }
}

/// Drain provider session changes into the manager, one at a time.
///
/// Holds only a weak reference so the manager can be dropped while idle.
/// Shutdown is only observed between changes.
async fn listen_for_changes(
    manager: Weak<SessionManager>,
    mut events: broadcast::Receiver<SessionChange>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            next = events.recv() => next,
        };
        let Some(manager) = manager.upgrade() else {
            break;
        };

        match next {
            Ok(change) => {
                debug!(
                    event = ?change.event,
                    has_session = change.session.is_some(),
                    "Session change received"
                );
                manager.apply_session(change.session).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Session change listener lagged, resyncing with provider");
                match manager.provider.get_current_session().await {
                    Ok(session) => manager.apply_session(session).await,
                    Err(e) => warn!(error = %e, "Resync lookup failed, keeping current state"),
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Provider closed the session change stream");
                break;
            }
        }
    }

    debug!("Session change listener stopped");
}
