use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::dispatcher::Dispatcher;
use super::traits::PushApi;
use super::transport::ApiResponse;
use crate::errors::{FcmError, FcmResult};
use crate::message::{
    encode_payload, merge_extra, require_object, validate_extra, Message, Target,
};
use crate::response::{parse_response, LegacySendResponse, SendResponse};

/// Maximum registration tokens in one legacy request
pub const MAX_RECIPIENTS: usize = 1000;

/// The key-authenticated legacy HTTP API
pub struct LegacyApi {
    dispatcher: Dispatcher,
    endpoint: String,
}

impl LegacyApi {
    pub fn new(dispatcher: Dispatcher, endpoint: impl Into<String>) -> Self {
        Self {
            dispatcher,
            endpoint: endpoint.into(),
        }
    }
}

/// Encode a message as a flat legacy request body
pub fn build_legacy_payload(message: &Message) -> FcmResult<Vec<u8>> {
    let mut fcm = Map::new();
    let options = &message.legacy;

    match &message.target {
        Some(Target::Token(token)) => {
            fcm.insert("to".to_string(), json!(token));
        }
        Some(Target::Tokens(tokens)) => match tokens.as_slice() {
            [] => return Err(FcmError::invalid_data("No registration tokens provided")),
            [token] => {
                fcm.insert("to".to_string(), json!(token));
            }
            tokens if tokens.len() > MAX_RECIPIENTS => {
                return Err(FcmError::invalid_data(format!(
                    "A legacy request addresses at most {MAX_RECIPIENTS} tokens, got {}",
                    tokens.len()
                )))
            }
            tokens => {
                fcm.insert("registration_ids".to_string(), json!(tokens));
            }
        },
        Some(Target::Topic(topic)) => {
            fcm.insert("to".to_string(), json!(format!("/topics/{topic}")));
        }
        Some(Target::Condition(condition)) => {
            fcm.insert("condition".to_string(), json!(condition));
        }
        None => {
            return Err(FcmError::invalid_data(
                "Message has no target: set a token, topic or condition",
            ))
        }
    }

    let v1_only = [
        ("android_config", &message.android),
        ("apns_config", &message.apns),
        ("webpush_config", &message.webpush),
        ("fcm_options", &message.fcm_options),
    ];
    if let Some((field, _)) = v1_only.iter().find(|(_, block)| block.is_some()) {
        return Err(FcmError::invalid_data(format!(
            "Provided {field} is not supported by the legacy API"
        )));
    }

    fcm.insert(
        "priority".to_string(),
        json!(if options.low_priority { "normal" } else { "high" }),
    );
    if options.delay_while_idle {
        fcm.insert("delay_while_idle".to_string(), json!(true));
    }
    if let Some(collapse_key) = &options.collapse_key {
        fcm.insert("collapse_key".to_string(), json!(collapse_key));
    }
    if let Some(ttl) = options.time_to_live {
        fcm.insert("time_to_live".to_string(), json!(ttl));
    }
    if let Some(package) = &options.restricted_package_name {
        fcm.insert("restricted_package_name".to_string(), json!(package));
    }
    if message.dry_run {
        fcm.insert("dry_run".to_string(), json!(true));
    }
    if options.content_available == Some(true) {
        fcm.insert("content_available".to_string(), json!(true));
    }

    if let Some(data) = &message.data {
        let data = require_object("data_message", data)?;
        if !data.is_empty() {
            fcm.insert("data".to_string(), Value::Object(data.clone()));
        }
    }

    if !options.remove_notification && !message.is_data_only() {
        fcm.insert(
            "notification".to_string(),
            Value::Object(legacy_notification(message)),
        );
    }

    validate_extra(&message.extra)?;
    merge_extra(&mut fcm, &message.extra);

    encode_payload(&Value::Object(fcm))
}

fn legacy_notification(message: &Message) -> Map<String, Value> {
    let n = &message.notification;
    let mut notification = Map::new();
    let mut put = |key: &str, value: &Option<String>| {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            notification.insert(key.to_string(), json!(value));
        }
    };

    put("icon", &n.icon);
    put("image", &n.image);
    put("click_action", &n.click_action);
    put("badge", &n.badge);
    put("color", &n.color);
    put("tag", &n.tag);
    // an empty sound would still play the default one
    put("sound", &n.sound);

    // localized keys only stand in for missing literal text
    if n.body.is_some() {
        put("body", &n.body);
    } else {
        put("body_loc_key", &n.body_loc_key);
    }
    if n.title.is_some() {
        put("title", &n.title);
    } else {
        put("title_loc_key", &n.title_loc_key);
    }

    if n.body.is_none() {
        if let Some(args) = &n.body_loc_args {
            notification.insert("body_loc_args".to_string(), json!(args));
        }
    }
    if n.title.is_none() {
        if let Some(args) = &n.title_loc_args {
            notification.insert("title_loc_args".to_string(), json!(args));
        }
    }

    merge_extra(&mut notification, &n.extra);
    notification
}

#[async_trait]
impl PushApi for LegacyApi {
    fn build_payload(&self, message: &Message) -> FcmResult<Vec<u8>> {
        build_legacy_payload(message)
    }

    async fn send(&self, payload: &[u8]) -> FcmResult<ApiResponse> {
        self.dispatcher.send(&self.endpoint, payload).await
    }

    fn parse_response(&self, response: &ApiResponse) -> FcmResult<SendResponse> {
        parse_response::<LegacySendResponse>(response).map(SendResponse::Legacy)
    }

    fn max_recipients(&self) -> usize {
        MAX_RECIPIENTS
    }

    fn endpoint(&self) -> FcmResult<String> {
        Ok(self.endpoint.clone())
    }
}
