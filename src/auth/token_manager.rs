use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{AccessToken, CredentialResolver};
use crate::errors::{FcmError, FcmResult};

/// A cached token is treated as stale this long before it actually expires
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => expiry > now && expiry > now + margin,
            None => true,
        }
    }
}

impl From<AccessToken> for CachedToken {
    fn from(token: AccessToken) -> Self {
        Self {
            token: token.token,
            expires_at: token.expires_at,
        }
    }
}

/// Owns the bearer token shared by every request of one client
///
/// Readers check the cached slot without waiting on anything. Refreshes are
/// serialized by `refresh_lock` and re-check the slot once they hold it, so a
/// crowd of callers hitting a stale token produces a single refresh. The lock
/// guard is dropped on every exit path, including a failed refresh.
pub struct TokenManager {
    resolver: Arc<CredentialResolver>,
    cached: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
    refresh_margin: chrono::Duration,
}

impl TokenManager {
    pub fn new(resolver: Arc<CredentialResolver>) -> Self {
        Self {
            resolver,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_margin: margin_from(TOKEN_REFRESH_MARGIN),
        }
    }

    /// Override the safety margin subtracted from the token expiry
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin_from(margin);
        self
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// Whether a cached token exists and is outside the safety margin
    pub fn is_token_valid(&self) -> bool {
        self.valid_token().is_some()
    }

    /// The cached token string, valid or not
    pub fn cached_token(&self) -> Option<String> {
        self.read_slot().as_ref().map(|cached| cached.token.clone())
    }

    /// Return a valid bearer token, refreshing it if needed
    ///
    /// # Errors
    ///
    /// - `Authentication` if the service account file cannot be loaded
    /// - `InvalidData` wrapping the cause if the credential fails to refresh;
    ///   the slot is left empty so the next call retries from scratch
    pub async fn get_access_token(&self) -> FcmResult<String> {
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }

        self.refresh_locked().await
    }

    /// Drop the cached token and try to fetch a new one right away
    ///
    /// A failed refresh is swallowed here; the next
    /// [`get_access_token`](Self::get_access_token) retries and reports it.
    pub async fn invalidate(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.best_effort_refresh().await;
    }

    /// Like [`invalidate`](Self::invalidate), but only if the slot still holds
    /// the token the server rejected. Concurrent requests rejected with the
    /// same token therefore refresh once.
    pub async fn invalidate_rejected(&self, rejected: &str) {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.valid_token() {
            if current != rejected {
                debug!("Rejected access token was already replaced, skipping refresh");
                return;
            }
        }
        self.best_effort_refresh().await;
    }

    async fn best_effort_refresh(&self) {
        if let Err(e) = self.refresh_locked().await {
            debug!(error = %e, "Proactive token refresh failed, deferring to next request");
        }
    }

    /// Refresh the token; the caller must hold `refresh_lock`
    async fn refresh_locked(&self) -> FcmResult<String> {
        *self.write_slot() = None;

        let credentials = self.resolver.credentials()?;
        match credentials.fetch_token().await {
            Ok(token) => {
                debug!(expires_at = ?token.expires_at, "Refreshed access token");
                let value = token.token.clone();
                *self.write_slot() = Some(token.into());
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh access token");
                Err(FcmError::invalid_data_with_source(
                    format!("Failed to refresh access token: {e:#}"),
                    e.into(),
                ))
            }
        }
    }

    fn valid_token(&self) -> Option<String> {
        let now = Utc::now();
        self.read_slot()
            .as_ref()
            .filter(|cached| cached.is_valid(now, self.refresh_margin))
            .map(|cached| cached.token.clone())
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, Option<CachedToken>> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<CachedToken>> {
        self.cached.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn margin_from(margin: Duration) -> chrono::Duration {
    chrono::Duration::seconds(margin.as_secs() as i64)
}
