use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;

use super::transport::ApiResponse;
use crate::errors::FcmResult;
use crate::message::Message;
use crate::response::SendResponse;

/// Sends one HTTP POST and reads the whole response
///
/// [`ReqwestTransport`](super::ReqwestTransport) is the production
/// implementation; tests substitute a scripted one.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `body` to `url`; `timeout` bounds this single attempt
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &[u8],
        timeout: Option<Duration>,
    ) -> FcmResult<ApiResponse>;
}

/// One generation of the push API
///
/// The OAuth2 v1 API and the key-based legacy API both implement this; the
/// client picks one at construction time.
#[async_trait]
pub trait PushApi: Send + Sync {
    /// Encode a message as the request body
    fn build_payload(&self, message: &Message) -> FcmResult<Vec<u8>>;

    /// POST an encoded payload, recovering from rate limiting and token expiry
    async fn send(&self, payload: &[u8]) -> FcmResult<ApiResponse>;

    /// Map a final response to a result or a typed error
    fn parse_response(&self, response: &ApiResponse) -> FcmResult<SendResponse>;

    /// How many device tokens a single request may address
    fn max_recipients(&self) -> usize;

    /// Resolved send endpoint
    fn endpoint(&self) -> FcmResult<String>;
}
