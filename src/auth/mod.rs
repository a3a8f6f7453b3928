//! OAuth2 credentials and bearer token lifecycle
//!
//! - **Credentials**: a signing identity able to mint access tokens
//! - **CredentialResolver**: picks the credential source and the target project
//! - **TokenManager**: caches the bearer token and refreshes it under a lock

pub mod resolver;
pub mod service_account;
pub mod token_manager;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use resolver::{CredentialResolver, CredentialSource};
pub use service_account::{ServiceAccountCredentials, ServiceAccountKey};
pub use token_manager::{TokenManager, TOKEN_REFRESH_MARGIN};

/// A freshly minted bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Absent when the issuer does not report a lifetime
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Whether the token has already passed its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }
}

/// A signing identity that can be exchanged for bearer tokens
///
/// Implement this to plug in application default credentials, a metadata
/// server, or any other token source. Errors are wrapped by the
/// [`TokenManager`] as [`FcmError::InvalidData`](crate::FcmError::InvalidData).
#[async_trait]
pub trait Credentials: Send + Sync {
    /// Project the identity belongs to, if the credential knows it
    fn project_id(&self) -> Option<String> {
        None
    }

    /// Obtain a new access token
    async fn fetch_token(&self) -> anyhow::Result<AccessToken>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_access_token_expiry() {
        let now = Utc::now();
        assert!(!AccessToken::new("t", None).is_expired(now));
        assert!(!AccessToken::new("t", Some(now + Duration::minutes(1))).is_expired(now));
        assert!(AccessToken::new("t", Some(now)).is_expired(now));
        assert!(AccessToken::new("t", Some(now - Duration::seconds(1))).is_expired(now));
    }
}
