//! Session phase state machine using rust-fsm.
//!
//! The phase is a coarse, externally observable summary of the session
//! manager. Every committed [`AuthState`](crate::AuthState) feeds one input;
//! the sign-in policy check feeds `PolicyRejected` and `RevocationComplete`.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Initializing   │ (initial, never re-entered)
//! └────────┬────────┘
//!          │ NoSession / AdminSession / UnprivilegedSession / PolicyRejected
//!          ▼
//! ┌─────────────────┐   AdminSession    ┌────────────────────┐
//! │ Unauthenticated │ ◄───────────────► │ AuthenticatedAdmin │
//! └────────┬────────┘     NoSession     └─────────┬──────────┘
//!          │                                      │
//!          │ UnprivilegedSession                  │ PolicyRejected
//!          ▼                                      ▼
//! ┌───────────────────────────┐        ┌───────────────────┐
//! │ AuthenticatedUnprivileged │        │ RejectingNonAdmin │ (transient)
//! └───────────────────────────┘        └─────────┬─────────┘
//!                                                │ RevocationComplete / NoSession
//!                                                ▼
//!                                         Unauthenticated
//! ```

use crate::types::AuthState;
use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Initializing)

    Initializing => {
        NoSession => Unauthenticated,
        AdminSession => AuthenticatedAdmin,
        UnprivilegedSession => AuthenticatedUnprivileged,
        PolicyRejected => RejectingNonAdmin
    },
    Unauthenticated => {
        NoSession => Unauthenticated,
        AdminSession => AuthenticatedAdmin,
        UnprivilegedSession => AuthenticatedUnprivileged,
        PolicyRejected => RejectingNonAdmin
    },
    AuthenticatedAdmin => {
        NoSession => Unauthenticated,
        AdminSession => AuthenticatedAdmin,
        UnprivilegedSession => AuthenticatedUnprivileged,
        PolicyRejected => RejectingNonAdmin
    },
    AuthenticatedUnprivileged => {
        NoSession => Unauthenticated,
        AdminSession => AuthenticatedAdmin,
        UnprivilegedSession => AuthenticatedUnprivileged,
        PolicyRejected => RejectingNonAdmin
    },
    RejectingNonAdmin => {
        RevocationComplete => Unauthenticated,
        NoSession => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption (logs, CLI status output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Initial lookup has not settled yet.
    Initializing,
    /// No session.
    Unauthenticated,
    /// Session held by an admin profile.
    AuthenticatedAdmin,
    /// Session whose profile is missing or not admin. Guards redirect.
    AuthenticatedUnprivileged,
    /// Non-admin sign-in is being revoked.
    RejectingNonAdmin,
}

impl SessionPhase {
    /// Returns true for phases that never persist on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionPhase::Initializing | SessionPhase::RejectingNonAdmin
        )
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Initializing => SessionPhase::Initializing,
            SessionMachineState::Unauthenticated => SessionPhase::Unauthenticated,
            SessionMachineState::AuthenticatedAdmin => SessionPhase::AuthenticatedAdmin,
            SessionMachineState::AuthenticatedUnprivileged => {
                SessionPhase::AuthenticatedUnprivileged
            }
            SessionMachineState::RejectingNonAdmin => SessionPhase::RejectingNonAdmin,
        }
    }
}

/// FSM input matching a settled auth state.
pub(crate) fn input_for(state: &AuthState) -> SessionMachineInput {
    match (&state.session, &state.profile) {
        (None, _) => SessionMachineInput::NoSession,
        (Some(_), Some(profile)) if profile.is_admin() => SessionMachineInput::AdminSession,
        (Some(_), _) => SessionMachineInput::UnprivilegedSession,
    }
}
