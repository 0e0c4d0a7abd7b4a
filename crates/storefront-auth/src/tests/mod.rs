//! Integration tests for the session manager.
//!
//! - `harness.rs`    - Mock identity provider, profile store and notifier
//! - `convergence.rs` - Initial lookup vs. pushed events, stale fetches, loading flag
//! - `sign_in.rs`    - Admin admission, policy rejection, credential failures
//! - `lifecycle.rs`  - Initialization, shutdown, sign-up and sign-out paths

mod lifecycle;
mod sign_in;
