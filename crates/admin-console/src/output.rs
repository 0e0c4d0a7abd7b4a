//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;
use storefront_auth::{AuthError, Notification, Notifier, Severity, TracingNotifier};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a serializable report: `Display` for text, pretty JSON otherwise.
pub fn print<T: Serialize + std::fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", value),
        },
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            let json = serde_json::json!({ "status": "success", "message": message });
            println!("{}", json);
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            let json = serde_json::json!({ "status": "error", "message": message });
            eprintln!("{}", json);
        }
    }
}

/// Report a failed auth operation.
///
/// In text mode the notifier has already shown the user-facing message, so
/// only JSON output gets an extra structured error.
pub fn print_auth_error(error: &AuthError, format: OutputFormat) {
    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "status": "error",
            "access_denied": error.is_policy_rejection(),
            "message": error.to_string(),
        });
        eprintln!("{}", json);
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", label), value);
}

/// Notifier that shows notifications on stderr in text mode.
///
/// Every notification is also logged.
pub struct ConsoleNotifier {
    format: OutputFormat,
}

impl ConsoleNotifier {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        if self.format == OutputFormat::Text {
            let marker = match notification.severity {
                Severity::Destructive => "✗",
                Severity::Success => "✓",
                Severity::Info => "•",
            };
            if notification.description.is_empty() {
                eprintln!("{} {}", marker, notification.title);
            } else {
                eprintln!(
                    "{} {}: {}",
                    marker, notification.title, notification.description
                );
            }
        }

        TracingNotifier.notify(notification);
    }
}
