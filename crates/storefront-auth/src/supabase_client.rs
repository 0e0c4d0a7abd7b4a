//! Supabase adapters for the identity provider and profile store.
//!
//! - `SupabaseIdentityProvider` talks to the GoTrue endpoints under
//!   `/auth/v1`, keeps the current session in memory (optionally mirrored to
//!   secure storage), refreshes it before it expires and broadcasts session
//!   changes.
//! - `SupabaseProfileStore` reads the `profiles` table through PostgREST
//!   with maybe-single semantics.

use crate::error::{AuthError, AuthResult};
use crate::provider::{IdentityProvider, ProfileStore};
use crate::types::{Profile, Session, SessionChange, SessionEvent, SignUpOptions};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use session_storage::{SecureStorage, StorageKeys};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Capacity of the session change broadcast channel.
const SESSION_EVENT_CAPACITY: usize = 32;

/// Per-request timeout for Supabase calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default PostgREST table holding profiles.
pub const DEFAULT_PROFILE_TABLE: &str = "profiles";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Pull the human-readable message out of a GoTrue error body.
fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Classify a failed request so callers can tell retryable failures apart.
fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else if e.is_connect() {
        AuthError::NetworkUnavailable
    } else {
        AuthError::Http(e)
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub(crate) struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// How long before expiry the session is refreshed, in seconds.
    pub expiry_margin_secs: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            expiry_margin_secs: 60,
        }
    }
}

impl RefreshConfig {
    /// Delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// When a session expiring at `expires_at` should be refreshed.
    pub fn refresh_due(&self, expires_at: DateTime<Utc>) -> DateTime<Utc> {
        expires_at - ChronoDuration::seconds(self.expiry_margin_secs)
    }
}

/// GoTrue token response (password grant, refresh grant, auto-confirmed sign-up).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<TokenResponse> for Session {
    fn from(data: TokenResponse) -> Self {
        let expires_at = Utc::now() + ChronoDuration::seconds(data.expires_in);
        Session {
            subject_id: data.user.id,
            access_token: data.access_token,
            refresh_token: Some(data.refresh_token),
            email: data.user.email,
            expires_at: Some(expires_at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    data: &'a serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchanges a refresh token for a fresh session.
#[async_trait]
pub(crate) trait RefreshGrant: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> AuthResult<Session>;
}

/// `POST /auth/v1/token?grant_type=refresh_token`
struct GoTrueRefreshGrant {
    http_client: Client,
    url: String,
    publishable_key: String,
}

#[async_trait]
impl RefreshGrant for GoTrueRefreshGrant {
    async fn exchange(&self, refresh_token: &str) -> AuthResult<Session> {
        let response = self
            .http_client
            .post(&self.url)
            .header("apikey", &self.publishable_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_summary = %summarize_response_body(&body), "Token refresh failed");
            return Err(if status.is_server_error() {
                AuthError::NetworkUnavailable
            } else {
                AuthError::Provider(
                    provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status)),
                )
            });
        }

        let data: TokenResponse = response.json().await?;
        Ok(data.into())
    }
}

/// Identity provider backed by Supabase Auth.
pub struct SupabaseIdentityProvider {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionChange>,
    refresh_config: RefreshConfig,
    refresh_grant: Arc<dyn RefreshGrant>,
    /// Where the session is kept between runs, if anywhere.
    storage: Option<Arc<dyn SecureStorage>>,
    /// Set until the stored session has been read back once.
    restore_pending: AtomicBool,
    /// Expiry of the current session, watched by the refresh timer.
    expiry: watch::Sender<Option<DateTime<Utc>>>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl SupabaseIdentityProvider {
    /// Create a provider with an empty in-memory session.
    pub fn new(supabase_url: impl Into<String>, publishable_key: impl Into<String>) -> AuthResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let supabase_url = supabase_url.into().trim_end_matches('/').to_string();
        let publishable_key = publishable_key.into();

        let refresh_grant = Arc::new(GoTrueRefreshGrant {
            http_client: http_client.clone(),
            url: format!("{}/auth/v1/token?grant_type=refresh_token", supabase_url),
            publishable_key: publishable_key.clone(),
        });
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        let (expiry, _) = watch::channel(None);

        Ok(Self {
            http_client,
            supabase_url,
            publishable_key,
            session: RwLock::new(None),
            events,
            refresh_config: RefreshConfig::default(),
            refresh_grant,
            storage: None,
            restore_pending: AtomicBool::new(false),
            expiry,
            auto_refresh: Mutex::new(None),
        })
    }

    /// Keep the session in `storage`. The stored session is restored and
    /// verified by the first [`get_current_session`](IdentityProvider::get_current_session).
    pub fn with_session_storage(mut self, storage: Arc<dyn SecureStorage>) -> Self {
        debug!(backend = storage.backend(), "Session storage configured");
        self.storage = Some(storage);
        self.restore_pending = AtomicBool::new(true);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_refresh_grant(
        mut self,
        refresh_grant: Arc<dyn RefreshGrant>,
        refresh_config: RefreshConfig,
    ) -> Self {
        self.refresh_grant = refresh_grant;
        self.refresh_config = refresh_config;
        self
    }

    /// Access token of the current session, if any.
    pub fn access_token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }

    /// Refresh the session shortly before it expires, for as long as the
    /// provider lives. Calling it again has no effect.
    pub fn start_auto_refresh(self: &Arc<Self>) {
        let mut slot = self.auto_refresh.lock();
        if slot.is_some() {
            return;
        }

        let task = auto_refresh(
            Arc::downgrade(self),
            self.expiry.subscribe(),
            self.refresh_config.clone(),
        );
        *slot = Some(tokio::spawn(task));
        debug!("Automatic token refresh started");
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, table)
    }

    /// Hold `session` in memory and schedule its refresh, without
    /// persisting or broadcasting.
    fn adopt(&self, session: Option<Session>) {
        let expires_at = session.as_ref().and_then(Session::expires_at_utc);
        *self.session.write() = session;
        self.expiry.send_replace(expires_at);
    }

    /// Store the session, mirror it to storage and broadcast the change.
    async fn set_session(&self, session: Option<Session>, event: SessionEvent) {
        self.adopt(session.clone());
        self.persist(session.as_ref()).await;

        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(SessionChange::new(event, session));
    }

    async fn persist(&self, session: Option<&Session>) {
        let Some(storage) = &self.storage else {
            return;
        };

        let result = match session {
            Some(session) => match serde_json::to_string(session) {
                Ok(json) => storage.set(StorageKeys::SUPABASE_SESSION, &json).await,
                Err(e) => {
                    warn!(error = %e, "Failed to encode session for storage");
                    return;
                }
            },
            None => storage
                .delete(StorageKeys::SUPABASE_SESSION)
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            warn!(backend = storage.backend(), error = %e, "Failed to persist session");
        }
    }

    /// Read the stored session back, once.
    async fn take_stored_session(&self) -> Option<Session> {
        if !self.restore_pending.swap(false, Ordering::SeqCst) {
            return None;
        }
        let storage = self.storage.as_ref()?;

        match storage.get(StorageKeys::SUPABASE_SESSION).await {
            Ok(Some(json)) => match serde_json::from_str::<Session>(&json) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Ignoring undecodable stored session");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(backend = storage.backend(), error = %e, "Failed to read stored session");
                None
            }
        }
    }

    /// Resume a session found in storage.
    ///
    /// Expired sessions go through refresh. Live ones are verified with the
    /// server; when the server cannot be reached the stored session is kept
    /// as is.
    async fn resume_stored_session(&self, stored: Session) -> AuthResult<Option<Session>> {
        if stored.is_expired() {
            info!(user_id = %stored.subject_id, "Stored session expired, attempting refresh");
            self.adopt(Some(stored));
            return self.refresh_expired().await;
        }

        match self.restore_session(stored.clone()).await {
            Ok(session) => Ok(Some(session)),
            Err(e) if e.is_transient() => {
                warn!(
                    user_id = %stored.subject_id,
                    error = %e,
                    "Could not verify stored session, keeping it until the server is reachable"
                );
                self.adopt(Some(stored.clone()));
                Ok(Some(stored))
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing it");
                self.set_session(None, SessionEvent::SignedOut).await;
                Ok(None)
            }
        }
    }

    async fn refresh_expired(&self) -> AuthResult<Option<Session>> {
        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(e) if e.is_transient() => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Refresh the current session with exponential backoff.
    ///
    /// Emits `TokenRefreshed` on success. On failure the session is cleared
    /// and `SignedOut` is emitted.
    pub async fn refresh_session(&self) -> AuthResult<Session> {
        let current = self.session.read().clone().ok_or(AuthError::NotLoggedIn)?;
        let Some(refresh_token) = current.refresh_token.clone() else {
            warn!("Session has no refresh token, clearing session");
            self.set_session(None, SessionEvent::SignedOut).await;
            return Err(AuthError::NotLoggedIn);
        };

        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.refresh_grant.exchange(&refresh_token).await {
                Ok(session) => {
                    info!(user_id = %session.subject_id, "Token refreshed successfully");
                    self.set_session(Some(session.clone()), SessionEvent::TokenRefreshed)
                        .await;
                    return Ok(session);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);

                    if attempt + 1 < self.refresh_config.max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed with non-transient error");
                    self.set_session(None, SessionEvent::SignedOut).await;
                    return Err(e);
                }
            }
        }

        warn!(
            attempts = self.refresh_config.max_retries,
            "Refresh retries exhausted, clearing session"
        );
        self.set_session(None, SessionEvent::SignedOut).await;

        Err(last_error.unwrap_or(AuthError::RefreshExhausted(
            self.refresh_config.max_retries,
        )))
    }

    /// Verify an access token against `/auth/v1/user`.
    ///
    /// Returns the subject ID the server associates with the token.
    pub async fn verify_access_token(&self, access_token: &str) -> AuthResult<String> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_summary = %summarize_response_body(&body), "Session verification failed");
            return Err(if status.is_server_error() {
                AuthError::NetworkUnavailable
            } else {
                AuthError::Provider(format!("Server rejected session: HTTP {}", status))
            });
        }

        let user: TokenUser = response.json().await?;
        debug!(user_id = %user.id, "Session verified with server");
        Ok(user.id)
    }

    /// Seed a session obtained elsewhere after verifying it with the server.
    ///
    /// Emits `SignedIn` once verified.
    pub async fn restore_session(&self, session: Session) -> AuthResult<Session> {
        let subject_id = self.verify_access_token(&session.access_token).await?;
        if subject_id != session.subject_id {
            warn!(
                expected = %session.subject_id,
                actual = %subject_id,
                "Restored session belongs to a different user"
            );
            return Err(AuthError::Provider(
                "Session belongs to a different user".to_string(),
            ));
        }

        info!(user_id = %subject_id, "Session restored");
        self.set_session(Some(session.clone()), SessionEvent::SignedIn)
            .await;
        Ok(session)
    }
}

impl Drop for SupabaseIdentityProvider {
    fn drop(&mut self) {
        if let Some(task) = self.auto_refresh.get_mut().take() {
            task.abort();
        }
    }
}

/// Refresh the session `refresh_config.expiry_margin_secs` before each expiry.
///
/// Idles while signed out. Holds only a weak reference, so dropping the
/// provider ends the task.
async fn auto_refresh(
    provider: Weak<SupabaseIdentityProvider>,
    mut expiry: watch::Receiver<Option<DateTime<Utc>>>,
    refresh_config: RefreshConfig,
) {
    loop {
        let due = (*expiry.borrow_and_update()).map(|at| refresh_config.refresh_due(at));

        let Some(due) = due else {
            if expiry.changed().await.is_err() {
                break;
            }
            continue;
        };

        let wait = (due - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            changed = expiry.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(wait) => {
                let Some(provider) = provider.upgrade() else {
                    break;
                };
                debug!("Session close to expiry, refreshing");
                if let Err(e) = provider.refresh_session().await {
                    warn!(error = %e, "Scheduled token refresh failed");
                }
            }
        }
    }

    debug!("Automatic token refresh stopped");
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn get_current_session(&self) -> AuthResult<Option<Session>> {
        if let Some(stored) = self.take_stored_session().await {
            return self.resume_stored_session(stored).await;
        }

        let current = self.session.read().clone();
        match current {
            Some(session) if session.is_expired() => {
                info!(user_id = %session.subject_id, "Session expired, attempting refresh");
                self.refresh_expired().await
            }
            other => Ok(other),
        }
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, secret: &str) -> AuthResult<Session> {
        let url = self.auth_url("token?grant_type=password");
        debug!(url = %url, email = %email, "Requesting password grant");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&PasswordGrant {
                email,
                password: secret,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_summary = %summarize_response_body(&body), "Password grant rejected");
            let message = provider_message(&body).unwrap_or_default();
            return Err(if status.is_client_error() {
                AuthError::InvalidCredentials(message)
            } else {
                AuthError::Provider(message)
            });
        }

        let data: TokenResponse = response.json().await?;
        let session = Session::from(data);
        info!(user_id = %session.subject_id, "Password grant accepted");

        self.set_session(Some(session.clone()), SessionEvent::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_up(&self, email: &str, secret: &str, options: &SignUpOptions) -> AuthResult<()> {
        let mut url = Url::parse(&self.auth_url("signup"))?;
        if let Some(redirect_to) = &options.email_redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }

        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.publishable_key)
            .json(&SignUpRequest {
                email,
                password: secret,
                data: &options.data,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = %status, body_summary = %summarize_response_body(&body), "Sign up rejected");
            return Err(AuthError::Provider(provider_message(&body).unwrap_or_default()));
        }

        // Projects without email confirmation answer with a full session.
        if let Ok(data) = serde_json::from_str::<TokenResponse>(&body) {
            let session = Session::from(data);
            info!(user_id = %session.subject_id, "Sign up returned an active session");
            self.set_session(Some(session), SessionEvent::SignedIn).await;
        } else {
            info!(email = %email, "Sign up accepted, confirmation pending");
        }

        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Some(access_token) = self.access_token() else {
            self.set_session(None, SessionEvent::SignedOut).await;
            return Ok(());
        };

        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let already_gone = matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        );

        if !status.is_success() && !already_gone {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body_summary = %summarize_response_body(&body), "Logout rejected");
            return Err(AuthError::Provider(
                provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        self.set_session(None, SessionEvent::SignedOut).await;
        info!("Logged out");
        Ok(())
    }
}

/// Profile store backed by a PostgREST table.
///
/// Requests carry the provider's current access token so row-level security
/// sees the signed-in subject.
pub struct SupabaseProfileStore {
    provider: Arc<SupabaseIdentityProvider>,
    table: String,
}

impl SupabaseProfileStore {
    pub fn new(provider: Arc<SupabaseIdentityProvider>, table: impl Into<String>) -> Self {
        Self {
            provider,
            table: table.into(),
        }
    }

    fn profile_url(&self, subject_id: &str) -> AuthResult<Url> {
        let mut url = Url::parse(&self.provider.rest_url(&self.table))?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", subject_id))
            .append_pair("select", "*")
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait]
impl ProfileStore for SupabaseProfileStore {
    async fn get_profile_by_subject_id(&self, subject_id: &str) -> AuthResult<Option<Profile>> {
        let url = self.profile_url(subject_id)?;
        let bearer = self
            .provider
            .access_token()
            .unwrap_or_else(|| self.provider.publishable_key.clone());

        debug!(user_id = %subject_id, table = %self.table, "Fetching profile");

        let response = self
            .provider
            .http_client
            .get(url)
            .header("apikey", &self.provider.publishable_key)
            .header("Accept", "application/json")
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            return Err(AuthError::ProfileFetch(format!(
                "{} ({})",
                status, body_summary
            )));
        }

        let rows: Vec<Profile> = response.json().await?;
        Ok(rows.into_iter().next())
    }
}
