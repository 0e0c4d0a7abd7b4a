//! Hosting driver for the guard decision.
//!
//! The driver owns a subscription to the auth state and applies the decision
//! to a [`RouteSurface`]. Side effects are only issued when the decision
//! changes, so repeated states never re-navigate.

use crate::decision::{decide, GuardDecision};
use std::sync::Arc;
use storefront_auth::AuthState;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default login route.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
/// Default dashboard route.
pub const DEFAULT_DASHBOARD_ROUTE: &str = "/";

/// Navigation collaborator for the protected region.
pub trait RouteSurface: Send + Sync {
    /// Navigate away to `route`.
    fn navigate(&self, route: &str);

    /// Render the protected children.
    fn render_protected(&self);

    /// Show a neutral waiting indicator.
    fn show_waiting(&self);
}

impl<T: RouteSurface + ?Sized> RouteSurface for Arc<T> {
    fn navigate(&self, route: &str) {
        (**self).navigate(route)
    }

    fn render_protected(&self) {
        (**self).render_protected()
    }

    fn show_waiting(&self) {
        (**self).show_waiting()
    }
}

/// Routes the guard navigates between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRoutes {
    pub login: String,
    pub dashboard: String,
}

impl Default for GuardRoutes {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_ROUTE.to_string(),
            dashboard: DEFAULT_DASHBOARD_ROUTE.to_string(),
        }
    }
}

/// Guard for one protected region.
pub struct AccessGuard<S: RouteSurface> {
    state: watch::Receiver<AuthState>,
    surface: S,
    routes: GuardRoutes,
    last: Option<GuardDecision>,
}

impl<S: RouteSurface> AccessGuard<S> {
    pub fn new(state: watch::Receiver<AuthState>, surface: S, routes: GuardRoutes) -> Self {
        Self {
            state,
            surface,
            routes,
            last: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn routes(&self) -> &GuardRoutes {
        &self.routes
    }

    /// Decision most recently applied to the surface.
    pub fn last_decision(&self) -> Option<GuardDecision> {
        self.last
    }

    /// Evaluate the latest state and apply the decision if it changed.
    ///
    /// Call on mount; [`run`](Self::run) calls it on every change.
    pub fn evaluate(&mut self) -> GuardDecision {
        let decision = decide(&self.state.borrow_and_update());

        if self.last != Some(decision) {
            debug!(
                previous = ?self.last,
                decision = ?decision,
                "Guard decision changed"
            );
            self.apply(decision);
            self.last = Some(decision);
        }

        decision
    }

    /// Evaluate on mount, then on every state change until the auth state
    /// sender goes away. Returns the last decision applied.
    pub async fn run(mut self) -> GuardDecision {
        let mut decision = self.evaluate();

        while self.state.changed().await.is_ok() {
            decision = self.evaluate();
        }

        debug!(decision = ?decision, "Auth state closed, guard stopped");
        decision
    }

    fn apply(&self, decision: GuardDecision) {
        match decision {
            GuardDecision::Wait => self.surface.show_waiting(),
            GuardDecision::Redirect => {
                info!(route = %self.routes.login, "Redirecting to login");
                self.surface.navigate(&self.routes.login);
            }
            GuardDecision::Render => self.surface.render_protected(),
        }
    }
}
