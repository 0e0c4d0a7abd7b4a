//! Authentication commands.

use super::{read_email, read_password, Context};
use crate::output::{self, OutputFormat};
use access_guard::{decide_login, LoginDecision};
use admin_config::{Config, Paths};
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;
use storefront_auth::{AuthState, SessionPhase, SignUpOptions};

/// Login with email and password. Only admins keep their session.
pub async fn login(
    paths: &Paths,
    config: Config,
    email: Option<String>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let ctx = Context::start(paths, &config, format).await?;

    if decide_login(&ctx.state()) == LoginDecision::EnterDashboard {
        let who = display_name(&ctx.state());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(ExitCode::SUCCESS);
    }

    let email = read_email(email)?;
    let password = read_password()?;

    if format == OutputFormat::Text {
        println!("Logging in...");
    }

    let outcome = ctx.manager.sign_in(&email, &password).await;
    match outcome.error {
        None => {
            let who = display_name(&ctx.state());
            output::print_success(&format!("Logged in as {}", who), format);
            Ok(ExitCode::SUCCESS)
        }
        Some(error) => {
            output::print_auth_error(&error, format);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Create credentials with the identity provider.
pub async fn signup(
    paths: &Paths,
    config: Config,
    email: Option<String>,
    full_name: Option<String>,
    redirect_to: Option<String>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let ctx = Context::start(paths, &config, format).await?;

    let email = read_email(email)?;
    let password = read_password()?;

    let mut options = SignUpOptions {
        email_redirect_to: redirect_to,
        ..Default::default()
    };
    if let Some(full_name) = full_name {
        options
            .data
            .insert("full_name".to_string(), serde_json::Value::String(full_name));
    }

    let outcome = ctx.manager.sign_up(&email, &password, options).await;
    match outcome.error {
        None => {
            output::print_success(
                &format!("Sign up accepted for {}. Check your inbox to confirm.", email),
                format,
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(error) => {
            output::print_auth_error(&error, format);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Logout and clear the stored session.
pub async fn logout(paths: &Paths, config: Config, format: OutputFormat) -> Result<ExitCode> {
    let ctx = Context::start(paths, &config, format).await?;

    if ctx.state().session.is_none() {
        output::print_success("Not logged in", format);
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = ctx.manager.sign_out().await;
    match outcome.error {
        None => {
            ctx.manager.wait_until_settled().await;
            if format == OutputFormat::Json {
                output::print_success("Logged out successfully", format);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(error) => {
            output::print_auth_error(&error, format);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Check authentication status.
pub async fn status(paths: &Paths, config: Config, format: OutputFormat) -> Result<ExitCode> {
    let ctx = Context::start(paths, &config, format).await?;
    let report = StatusReport::new(&ctx.state(), ctx.manager.phase());
    output::print(&report, format);
    Ok(ExitCode::SUCCESS)
}

fn display_name(state: &AuthState) -> String {
    state
        .profile
        .as_ref()
        .and_then(|p| p.display_name.clone())
        .or_else(|| state.session.as_ref().and_then(|s| s.email.clone()))
        .or_else(|| state.subject_id().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Summary printed by `status`.
#[derive(Debug, Serialize)]
struct StatusReport {
    logged_in: bool,
    is_admin: bool,
    phase: SessionPhase,
    user_id: Option<String>,
    email: Option<String>,
    role: Option<String>,
    expires_at: Option<String>,
}

impl StatusReport {
    fn new(state: &AuthState, phase: SessionPhase) -> Self {
        Self {
            logged_in: state.is_authenticated(),
            is_admin: state.is_admin(),
            phase,
            user_id: state.subject_id().map(str::to_string),
            email: state.session.as_ref().and_then(|s| s.email.clone()),
            role: state.profile.as_ref().map(|p| p.role.to_string()),
            expires_at: state.session.as_ref().and_then(|s| s.expires_at.clone()),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.logged_in {
            return write!(f, "Auth:     not logged in");
        }

        writeln!(
            f,
            "Auth:     {}",
            if self.is_admin {
                "logged in (admin)"
            } else {
                "logged in (no admin access)"
            }
        )?;
        writeln!(f, "User ID:  {}", self.user_id.as_deref().unwrap_or("unknown"))?;
        if let Some(email) = &self.email {
            writeln!(f, "Email:    {}", email)?;
        }
        writeln!(f, "Role:     {}", self.role.as_deref().unwrap_or("none"))?;
        write!(
            f,
            "Expires:  {}",
            self.expires_at.as_deref().unwrap_or("unknown")
        )
    }
}
