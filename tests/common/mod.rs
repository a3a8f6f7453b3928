//! Common test utilities and helpers
//!
//! A scripted HTTP transport and a counting credential, so client behavior can
//! be exercised end to end without network access.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use fcm_push::clients::{ApiResponse, HttpTransport};
use fcm_push::{AccessToken, Credentials, FcmClientConfig, FcmError, FcmNotification, FcmResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Route test logs through the test writer; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One request as seen by the transport
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub timeout: Option<Duration>,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }

    pub fn authorization(&self) -> String {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

/// Transport that answers from a script, then from a fallback
pub struct MockTransport {
    script: Mutex<VecDeque<ApiResponse>>,
    fallback: Option<ApiResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn scripted(responses: Vec<ApiResponse>) -> Arc<Self> {
        Arc::new(Self::build(responses, None, None))
    }

    /// Every request succeeds with a v1 message name after `latency`
    pub fn always_ok(latency: Option<Duration>) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Some(v1_ok("projects/demo/messages/1")), latency))
    }

    fn build(
        responses: Vec<ApiResponse>,
        fallback: Option<ApiResponse>,
        latency: Option<Duration>,
    ) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            latency,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &[u8],
        timeout: Option<Duration>,
    ) -> FcmResult<ApiResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers,
            body: body.to_vec(),
            timeout,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| FcmError::server("mock transport script exhausted"))
    }
}

/// Credential that mints `token-1`, `token-2`, ... valid for an hour
pub struct MockCredentials {
    project_id: Option<String>,
    fetches: AtomicUsize,
}

impl MockCredentials {
    pub fn new(project_id: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            project_id: project_id.map(str::to_string),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Credentials for MockCredentials {
    fn project_id(&self) -> Option<String> {
        self.project_id.clone()
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(
            format!("token-{n}"),
            Some(Utc::now() + ChronoDuration::hours(1)),
        ))
    }
}

/// v1 client over the mock transport, with credentials for project `demo`
pub fn v1_client(
    transport: Arc<MockTransport>,
    credentials: Arc<MockCredentials>,
    config: FcmClientConfig,
) -> FcmNotification {
    let credentials: Arc<dyn Credentials> = credentials;
    FcmNotification::from_parts(config, Some(credentials), transport)
        .expect("client should build")
}

pub fn legacy_client(transport: Arc<MockTransport>) -> FcmNotification {
    FcmNotification::from_parts(FcmClientConfig::legacy("server-key"), None, transport)
        .expect("client should build")
}

pub fn v1_ok(name: &str) -> ApiResponse {
    ApiResponse::json(StatusCode::OK, &json!({ "name": name }))
}

pub fn legacy_ok() -> ApiResponse {
    ApiResponse::json(
        StatusCode::OK,
        &json!({
            "multicast_id": 108,
            "success": 1,
            "failure": 0,
            "canonical_ids": 0,
            "results": [{"message_id": "1:08"}]
        }),
    )
}

pub fn rate_limited(seconds: &'static str) -> ApiResponse {
    ApiResponse::json(
        StatusCode::TOO_MANY_REQUESTS,
        &json!({"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}}),
    )
    .with_header(RETRY_AFTER, HeaderValue::from_static(seconds))
}

pub fn access_token_expired() -> ApiResponse {
    ApiResponse::json(
        StatusCode::UNAUTHORIZED,
        &json!({
            "error": {
                "code": 401,
                "status": "UNAUTHENTICATED",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "ACCESS_TOKEN_EXPIRED"
                }]
            }
        }),
    )
}

pub fn status(code: StatusCode, body: &str) -> ApiResponse {
    ApiResponse::new(code, HeaderMap::new(), body)
}
