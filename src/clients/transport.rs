use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, RETRY_AFTER};
use reqwest::{Client, Proxy, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::traits::HttpTransport;
use crate::config::FcmClientConfig;
use crate::errors::{FcmError, FcmResult};

/// Reason reported by the provider when the bearer token has expired
pub const ACCESS_TOKEN_EXPIRED: &str = "ACCESS_TOKEN_EXPIRED";

/// A fully read HTTP response, detached from the client that produced it
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Response with a JSON body and matching content length
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let body = body.to_string().into_bytes();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Self::new(status, headers, body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Declared `Content-Length`, if present and numeric
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Server-directed wait before resending
    ///
    /// Only a positive whole number of seconds counts; HTTP-date values and
    /// zero are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        let seconds: u64 = self
            .headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()?;
        (seconds > 0).then(|| Duration::from_secs(seconds))
    }

    /// Whether this is a 401 caused by an expired access token
    pub fn is_access_token_expired(&self) -> bool {
        if self.status != StatusCode::UNAUTHORIZED {
            return false;
        }

        let Ok(body) = serde_json::from_slice::<Value>(&self.body) else {
            return false;
        };

        body.pointer("/error/details")
            .and_then(Value::as_array)
            .is_some_and(|details| {
                details.iter().any(|detail| {
                    detail.get("reason").and_then(Value::as_str) == Some(ACCESS_TOKEN_EXPIRED)
                })
            })
    }
}

/// Production transport over one pooled `reqwest::Client`
///
/// The pool is shared by every task and thread using the client, so TLS
/// sessions are reused across requests.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the HTTP client from proxy and user agent settings
    pub fn new(config: &FcmClientConfig) -> FcmResult<Self> {
        let mut client_builder = Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10);

        if let Some(user_agent) = &config.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        }

        if let Some(proxy) = &config.proxy {
            if let Some(http) = &proxy.http {
                let proxy = Proxy::http(http)
                    .map_err(|e| FcmError::configuration_with_source("Invalid http proxy", e))?;
                client_builder = client_builder.proxy(proxy);
            }
            if let Some(https) = &proxy.https {
                let proxy = Proxy::https(https)
                    .map_err(|e| FcmError::configuration_with_source("Invalid https proxy", e))?;
                client_builder = client_builder.proxy(proxy);
            }
        }

        let client = client_builder
            .build()
            .map_err(|e| FcmError::configuration_with_source("Failed to create HTTP client", e))?;

        Ok(Self { client })
    }

    /// The underlying client, shared with the service account token exchange
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &[u8],
        timeout: Option<Duration>,
    ) -> FcmResult<ApiResponse> {
        let mut request = self.client.post(url).headers(headers).body(body.to_vec());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FcmError::transport(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FcmError::transport(url, e))?;

        Ok(ApiResponse::new(status, headers, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use serde_json::json;

    fn expired_body() -> Value {
        json!({
            "error": {
                "code": 401,
                "message": "Request had invalid authentication credentials.",
                "status": "UNAUTHENTICATED",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "ACCESS_TOKEN_EXPIRED",
                    "domain": "googleapis.com"
                }]
            }
        })
    }

    #[test]
    fn test_retry_after_parsing() {
        let response = ApiResponse::new(StatusCode::TOO_MANY_REQUESTS, HeaderMap::new(), "");
        assert_eq!(response.retry_after(), None);

        let with = |value: &'static str| {
            response
                .clone()
                .with_header(RETRY_AFTER, HeaderValue::from_static(value))
        };
        assert_eq!(with("2").retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(with(" 7 ").retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(with("0").retry_after(), None);
        assert_eq!(with("-3").retry_after(), None);
        assert_eq!(with("Wed, 21 Oct 2015 07:28:00 GMT").retry_after(), None);
    }

    #[test]
    fn test_access_token_expired_detection() {
        let expired = ApiResponse::json(StatusCode::UNAUTHORIZED, &expired_body());
        assert!(expired.is_access_token_expired());

        // same body on another status is not an expiry signal
        let forbidden = ApiResponse::json(StatusCode::FORBIDDEN, &expired_body());
        assert!(!forbidden.is_access_token_expired());

        let other_reason = ApiResponse::json(
            StatusCode::UNAUTHORIZED,
            &json!({"error": {"details": [{"reason": "CREDENTIALS_MISSING"}]}}),
        );
        assert!(!other_reason.is_access_token_expired());

        let not_json = ApiResponse::new(StatusCode::UNAUTHORIZED, HeaderMap::new(), "denied");
        assert!(!not_json.is_access_token_expired());
    }

    #[test]
    fn test_content_length() {
        let response = ApiResponse::json(StatusCode::OK, &json!({"name": "x"}));
        assert_eq!(response.content_length(), Some(response.body.len() as u64));
        assert_eq!(response.text(), r#"{"name":"x"}"#);
    }

    #[test]
    fn test_transport_with_proxy() {
        let config = FcmClientConfig::default().with_proxy(ProxyConfig {
            http: Some("http://proxy.local:8080".to_string()),
            https: Some("http://proxy.local:8443".to_string()),
        });
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
