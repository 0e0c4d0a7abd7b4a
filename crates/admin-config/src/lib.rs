//! Configuration, paths and logging for the storefront admin tools.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_DASHBOARD_ROUTE, DEFAULT_LOGIN_ROUTE, DEFAULT_LOG_LEVEL,
    DEFAULT_PROFILE_TABLE, DEFAULT_SUPABASE_PUBLISHABLE_KEY, DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
