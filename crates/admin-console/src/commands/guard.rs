//! Evaluate the dashboard guard against the current session.

use super::Context;
use crate::output::{self, OutputFormat};
use access_guard::{AccessGuard, GuardDecision, GuardRoutes, RouteSurface};
use admin_config::{Config, Paths};
use anyhow::Result;
use std::process::ExitCode;
use tracing::info;

/// Route surface that reports guard effects on the terminal.
struct ConsoleSurface {
    dashboard: String,
    format: OutputFormat,
}

impl ConsoleSurface {
    fn report(&self, decision: GuardDecision, route: Option<&str>) {
        match self.format {
            OutputFormat::Text => {
                let label = match decision {
                    GuardDecision::Wait => "waiting",
                    GuardDecision::Redirect => "redirect",
                    GuardDecision::Render => "render",
                };
                output::print_row(label, route.unwrap_or("-"));
            }
            OutputFormat::Json => {
                let json = serde_json::json!({ "decision": decision, "route": route });
                println!("{}", json);
            }
        }
    }
}

impl RouteSurface for ConsoleSurface {
    fn navigate(&self, route: &str) {
        self.report(GuardDecision::Redirect, Some(route));
    }

    fn render_protected(&self) {
        self.report(GuardDecision::Render, Some(&self.dashboard));
    }

    fn show_waiting(&self) {
        self.report(GuardDecision::Wait, None);
    }
}

/// Mount the guard once, or keep it mounted until Ctrl-C with `watch`.
///
/// Exits successfully only when the dashboard would render.
pub async fn guard(
    paths: &Paths,
    config: Config,
    watch: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let routes = GuardRoutes {
        login: config.login_route.clone(),
        dashboard: config.dashboard_route.clone(),
    };
    let ctx = Context::start(paths, &config, format).await?;

    let surface = ConsoleSurface {
        dashboard: routes.dashboard.clone(),
        format,
    };
    let mut guard = AccessGuard::new(ctx.manager.subscribe(), surface, routes);
    let mut decision = guard.evaluate();

    if watch {
        info!("Watching session for guard changes");
        tokio::select! {
            last = guard.run() => decision = last,
            _ = tokio::signal::ctrl_c() => {
                decision = access_guard::decide(&ctx.state());
            }
        }
    }

    info!(decision = ?decision, "Guard evaluated");

    Ok(if decision == GuardDecision::Render {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
