use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::traits::HttpTransport;
use super::transport::ApiResponse;
use crate::auth::TokenManager;
use crate::errors::{FcmError, FcmResult};

/// How requests prove the sender's identity
#[derive(Clone)]
pub enum Authorization {
    /// OAuth2 bearer token from the shared token manager
    Bearer(Arc<TokenManager>),
    /// Static server key of the legacy protocol
    ApiKey(String),
}

/// Issues POSTs and resends them while the provider asks for it
///
/// Two conditions trigger a resend of the identical payload:
///
/// - a `Retry-After` header with a positive number of seconds: the calling
///   task sleeps that long first
/// - a 401 whose error details carry `ACCESS_TOKEN_EXPIRED` (bearer auth
///   only): the rejected token is invalidated before resending
///
/// There is no attempt cap and no deadline across attempts; the configured
/// timeout bounds each attempt separately. Callers that need an overall
/// deadline wrap the call in `tokio::time::timeout`.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    authorization: Authorization,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        authorization: Authorization,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            authorization,
            timeout,
        }
    }

    /// Current headers, plus the bearer token they carry
    pub async fn request_headers(&self) -> FcmResult<(HeaderMap, Option<String>)> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let (auth_value, bearer) = match &self.authorization {
            Authorization::Bearer(tokens) => {
                let token = tokens.get_access_token().await?;
                (format!("Bearer {token}"), Some(token))
            }
            Authorization::ApiKey(key) => (format!("key={key}"), None),
        };

        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|_| FcmError::invalid_data("Credential is not a valid header value"))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        Ok((headers, bearer))
    }

    /// POST `payload` to `url`, retrying on rate limiting and token expiry
    pub async fn send(&self, url: &str, payload: &[u8]) -> FcmResult<ApiResponse> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let (headers, bearer) = self.request_headers().await?;
            debug!(url, attempt, bytes = payload.len(), "Sending push request");

            let response = self
                .transport
                .post(url, headers, payload, self.timeout)
                .await?;

            if let Some(delay) = response.retry_after() {
                warn!(
                    status = response.status.as_u16(),
                    delay_secs = delay.as_secs(),
                    attempt,
                    "Rate limited by FCM, waiting before resending"
                );
                sleep(delay).await;
                continue;
            }

            if let (Authorization::Bearer(tokens), Some(token)) = (&self.authorization, &bearer) {
                if response.is_access_token_expired() {
                    info!(attempt, "Access token expired, refreshing and resending");
                    tokens.invalidate_rejected(token).await;
                    continue;
                }
            }

            return Ok(response);
        }
    }
}
