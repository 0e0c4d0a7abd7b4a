//! Pure guard decisions over a single auth state snapshot.

use serde::Serialize;
use storefront_auth::AuthState;

/// What a protected region should do for a given auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    /// Show a neutral waiting indicator. Neither content nor redirect.
    Wait,
    /// Send the visitor to the login surface.
    Redirect,
    /// Render the protected content.
    Render,
}

/// Decide how to gate the protected region.
///
/// A session whose profile is missing or not admin is treated exactly like
/// no session at all.
pub fn decide(state: &AuthState) -> GuardDecision {
    if state.is_loading {
        return GuardDecision::Wait;
    }

    match (&state.session, &state.profile) {
        (Some(_), Some(profile)) if profile.is_admin() => GuardDecision::Render,
        _ => GuardDecision::Redirect,
    }
}

/// What the login surface should do for a given auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginDecision {
    /// Show the login form.
    Stay,
    /// A settled admin is already signed in.
    EnterDashboard,
}

pub fn decide_login(state: &AuthState) -> LoginDecision {
    if state.is_admin() {
        LoginDecision::EnterDashboard
    } else {
        LoginDecision::Stay
    }
}
