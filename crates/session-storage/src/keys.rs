//! Storage key constants.

/// Keys used by the admin tools.
pub struct StorageKeys;

impl StorageKeys {
    /// Current Supabase session (JSON, includes access and refresh tokens)
    pub const SUPABASE_SESSION: &'static str = "supabase_session";
}
