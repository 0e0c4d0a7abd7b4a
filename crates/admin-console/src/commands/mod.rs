//! CLI command implementations.

mod auth;
mod guard;

pub use auth::{login, logout, signup, status};
pub use guard::guard;

use crate::output::{ConsoleNotifier, OutputFormat};
use admin_config::{Config, Paths};
use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;
use storefront_auth::{
    AuthState, SessionManager, SupabaseIdentityProvider, SupabaseProfileStore,
};
use tracing::debug;

/// Environment variable read instead of prompting for a password.
const PASSWORD_ENV: &str = "STOREFRONT_ADMIN_PASSWORD";

/// A running session manager wired to the configured Supabase project.
pub struct Context {
    pub manager: Arc<SessionManager>,
}

impl Context {
    /// Build the Supabase collaborators, initialize the manager and wait
    /// for the initial session to settle.
    pub async fn start(paths: &Paths, config: &Config, format: OutputFormat) -> Result<Self> {
        let storage = session_storage::create_storage(&paths.session_file()).await;
        let provider = Arc::new(
            SupabaseIdentityProvider::new(&config.supabase_url, &config.supabase_publishable_key)?
                .with_session_storage(storage),
        );
        provider.start_auto_refresh();
        let profiles = Arc::new(SupabaseProfileStore::new(
            provider.clone(),
            config.profile_table.clone(),
        ));
        let notifier = Arc::new(ConsoleNotifier::new(format));

        let manager = SessionManager::new(provider, profiles, notifier);
        manager.initialize().await?;

        let state = manager.wait_until_settled().await;
        debug!(
            has_session = state.session.is_some(),
            is_admin = state.is_admin(),
            "Session settled"
        );

        Ok(Self { manager })
    }

    pub fn state(&self) -> AuthState {
        self.manager.current()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.manager.shutdown();
    }
}

/// Prompt for a line on stdout, returning the trimmed answer.
fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Use the given email or prompt for one.
fn read_email(email: Option<String>) -> Result<String> {
    let email = match email {
        Some(email) => email.trim().to_string(),
        None => prompt("Email")?,
    };

    if email.is_empty() {
        anyhow::bail!("Email is required");
    }
    Ok(email)
}

/// Read the password from the environment or prompt without echo.
fn read_password() -> Result<String> {
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}
