//! Access guard for the storefront admin dashboard.
//!
//! - `decide` maps an auth state snapshot to wait, redirect or render
//! - `decide_login` tells the login surface when to forward a signed-in admin
//! - `AccessGuard` re-evaluates on mount and on every state change and
//!   applies the decision to a `RouteSurface`

mod decision;
mod guard;

pub use decision::{decide, decide_login, GuardDecision, LoginDecision};
pub use guard::{
    AccessGuard, GuardRoutes, RouteSurface, DEFAULT_DASHBOARD_ROUTE, DEFAULT_LOGIN_ROUTE,
};
