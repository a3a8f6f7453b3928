use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::traits::PushApi;
use super::transport::ApiResponse;
use crate::auth::CredentialResolver;
use crate::errors::{FcmError, FcmResult};
use crate::message::{
    encode_payload, merge_extra, require_object, validate_extra, Message, Target,
};
use crate::response::{parse_response, SendResponse, V1SendResponse};

/// The OAuth2 `projects.messages.send` API
pub struct V1Api {
    resolver: Arc<CredentialResolver>,
    dispatcher: Dispatcher,
    endpoint_base: String,
    endpoint: OnceCell<String>,
}

impl V1Api {
    pub fn new(
        resolver: Arc<CredentialResolver>,
        dispatcher: Dispatcher,
        endpoint_base: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            endpoint_base: endpoint_base.into(),
            endpoint: OnceCell::new(),
        }
    }

    pub fn project_id(&self) -> FcmResult<&str> {
        self.resolver.project_id()
    }

    fn resolved_endpoint(&self) -> FcmResult<&str> {
        self.endpoint
            .get_or_try_init(|| {
                let project_id = self.resolver.project_id()?;
                Ok::<_, FcmError>(format!(
                    "{}/{}/messages:send",
                    self.endpoint_base.trim_end_matches('/'),
                    project_id
                ))
            })
            .map(String::as_str)
    }
}

/// Encode a message as a v1 request body
///
/// Keys are sorted and the output is compact, so equal messages always encode
/// to identical bytes.
pub fn build_v1_payload(message: &Message) -> FcmResult<Vec<u8>> {
    let mut fcm = Map::new();

    match &message.target {
        Some(Target::Token(token)) => {
            fcm.insert("token".to_string(), json!(token));
        }
        Some(Target::Topic(topic)) => {
            fcm.insert("topic".to_string(), json!(topic));
        }
        Some(Target::Condition(condition)) => {
            fcm.insert("condition".to_string(), json!(condition));
        }
        Some(Target::Tokens(_)) => {
            return Err(FcmError::invalid_data(
                "A v1 message addresses a single token; use notify_multiple_devices",
            ))
        }
        None => {
            return Err(FcmError::invalid_data(
                "Message has no target: set a token, topic or condition",
            ))
        }
    }

    if let Some(data) = &message.data {
        let data = require_object("data_payload", data)?;
        if !data.is_empty() {
            fcm.insert("data".to_string(), Value::Object(data.clone()));
        }
    }

    let blocks = [
        ("android_config", "android", &message.android),
        ("webpush_config", "webpush", &message.webpush),
        ("apns_config", "apns", &message.apns),
        ("fcm_options", "fcm_options", &message.fcm_options),
    ];
    for (field, key, block) in blocks {
        if let Some(block) = block {
            let block = require_object(field, block)?;
            fcm.insert(key.to_string(), Value::Object(block.clone()));
        }
    }

    if !message.is_data_only() {
        let mut notification = Map::new();
        let display = [
            ("title", &message.notification.title),
            ("body", &message.notification.body),
            ("image", &message.notification.image),
        ];
        for (key, value) in display {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                notification.insert(key.to_string(), json!(value));
            }
        }
        merge_extra(&mut notification, &message.notification.extra);
        fcm.insert("notification".to_string(), Value::Object(notification));
    }

    validate_extra(&message.extra)?;
    merge_extra(&mut fcm, &message.extra);

    let body = json!({
        "message": fcm,
        "validate_only": message.dry_run,
    });
    encode_payload(&body)
}

#[async_trait]
impl PushApi for V1Api {
    fn build_payload(&self, message: &Message) -> FcmResult<Vec<u8>> {
        build_v1_payload(message)
    }

    async fn send(&self, payload: &[u8]) -> FcmResult<ApiResponse> {
        let endpoint = self.resolved_endpoint()?;
        self.dispatcher.send(endpoint, payload).await
    }

    fn parse_response(&self, response: &ApiResponse) -> FcmResult<SendResponse> {
        parse_response::<V1SendResponse>(response).map(SendResponse::V1)
    }

    fn max_recipients(&self) -> usize {
        1
    }

    fn endpoint(&self) -> FcmResult<String> {
        self.resolved_endpoint().map(str::to_string)
    }
}
