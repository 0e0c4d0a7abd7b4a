//! storefront-admin - command-line access to the storefront admin session.

mod commands;
mod output;

use admin_config::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::debug;

/// Sign in to the storefront dashboard and check admin access.
#[derive(Parser)]
#[command(name = "storefront-admin")]
#[command(about = "Admin session management for the storefront dashboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also print logs to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password (admins only)
    Login {
        /// Account email; prompted when omitted
        #[arg(short, long, env = "STOREFRONT_ADMIN_EMAIL")]
        email: Option<String>,
    },

    /// Create an account
    Signup {
        /// Account email; prompted when omitted
        #[arg(short, long)]
        email: Option<String>,
        /// Full name stored with the account
        #[arg(long)]
        full_name: Option<String>,
        /// Where the confirmation email should send the user
        #[arg(long)]
        redirect_to: Option<String>,
    },

    /// Logout and clear the stored session
    Logout,

    /// Check authentication status
    Status,

    /// Evaluate the dashboard guard for the current session
    Guard {
        /// Keep evaluating on every session change until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(&paths, &config.log_level, cli.verbose)?;
    debug!(
        supabase_url = %config.supabase_url,
        profile_table = %config.profile_table,
        "Configuration loaded"
    );

    let format = cli.format;
    match cli.command {
        Commands::Login { email } => commands::login(&paths, config, email, format).await,
        Commands::Signup {
            email,
            full_name,
            redirect_to,
        } => commands::signup(&paths, config, email, full_name, redirect_to, format).await,
        Commands::Logout => commands::logout(&paths, config, format).await,
        Commands::Status => commands::status(&paths, config, format).await,
        Commands::Guard { watch } => commands::guard(&paths, config, watch, format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.format;

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e), format);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_with_email_and_json() {
        let cli = Cli::parse_from([
            "storefront-admin",
            "login",
            "--email",
            "admin@x.com",
            "--format",
            "json",
        ]);
        assert_eq!(cli.format, output::OutputFormat::Json);
        match cli.command {
            Commands::Login { email } => assert_eq!(email.as_deref(), Some("admin@x.com")),
            _ => panic!("expected login"),
        }
    }

    #[test]
    fn test_parse_guard_watch() {
        let cli = Cli::parse_from(["storefront-admin", "guard", "--watch", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Guard { watch: true }));
    }
}
