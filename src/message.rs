//! Logical notification fields, independent of the wire protocol
//!
//! A [`Message`] is plain data. The protocol implementations in
//! [`clients`](crate::clients) turn it into a request body and enforce the
//! type constraints on the loosely typed override blocks.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::errors::{FcmError, FcmResult};

/// Who a message is routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single device registration token
    Token(String),
    /// Several device tokens in one request (legacy protocol only)
    Tokens(Vec<String>),
    /// A named topic, without the `/topics/` prefix
    Topic(String),
    /// A boolean expression over topics, e.g. `'a' in topics && 'b' in topics`
    Condition(String),
}

/// Display fields shown in the notification tray
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    pub title: Option<String>,
    pub body: Option<String>,
    pub image: Option<String>,
    // legacy-only display fields
    pub icon: Option<String>,
    pub sound: Option<String>,
    pub badge: Option<String>,
    pub color: Option<String>,
    pub tag: Option<String>,
    pub click_action: Option<String>,
    pub body_loc_key: Option<String>,
    pub body_loc_args: Option<Vec<String>>,
    pub title_loc_key: Option<String>,
    pub title_loc_args: Option<Vec<String>>,
    /// Opaque passthrough pairs merged into the notification block
    pub extra: Map<String, Value>,
}

impl Notification {
    /// Whether a title or body was given, i.e. this is a display notification
    pub fn has_display_text(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
            || self.body.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// Options only understood by the legacy key-based protocol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyOptions {
    pub collapse_key: Option<String>,
    /// Seconds the message is kept while the device is offline
    pub time_to_live: Option<u32>,
    pub restricted_package_name: Option<String>,
    pub delay_while_idle: bool,
    pub low_priority: bool,
    pub content_available: Option<bool>,
    /// Drop the notification block and send a pure data message
    pub remove_notification: bool,
}

/// One push message
///
/// # Example
///
/// ```rust
/// use fcm_push::Message;
/// use serde_json::json;
///
/// let message = Message::new()
///     .token("device-registration-token")
///     .title("Build finished")
///     .body("main is green")
///     .data(json!({"build": "1234"}));
/// assert!(message.notification.has_display_text());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub target: Option<Target>,
    pub notification: Notification,
    /// Arbitrary key/value payload; must be a JSON object
    pub data: Option<Value>,
    /// Platform override blocks; each must be a JSON object
    pub android: Option<Value>,
    pub apns: Option<Value>,
    pub webpush: Option<Value>,
    pub fcm_options: Option<Value>,
    /// Ask the provider to validate without delivering
    pub dry_run: bool,
    /// Opaque passthrough pairs merged at the top level of the message
    pub extra: Map<String, Value>,
    pub legacy: LegacyOptions,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.target = Some(Target::Token(token.into()));
        self
    }

    /// Route to a topic, unless a condition was already set
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        if !matches!(self.target, Some(Target::Condition(_))) {
            self.target = Some(Target::Topic(topic.into()));
        }
        self
    }

    /// Route by topic condition; takes precedence over a topic name
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.target = Some(Target::Condition(condition.into()));
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.notification.title = Some(title.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.notification.body = Some(body.into());
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.notification.image = Some(image.into());
        self
    }

    /// Localized body, used by the legacy API when no literal body is set
    pub fn body_loc(mut self, key: impl Into<String>, args: Vec<String>) -> Self {
        self.notification.body_loc_key = Some(key.into());
        self.notification.body_loc_args = Some(args);
        self
    }

    /// Localized title, used by the legacy API when no literal title is set
    pub fn title_loc(mut self, key: impl Into<String>, args: Vec<String>) -> Self {
        self.notification.title_loc_key = Some(key.into());
        self.notification.title_loc_args = Some(args);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn android(mut self, config: Value) -> Self {
        self.android = Some(config);
        self
    }

    pub fn apns(mut self, config: Value) -> Self {
        self.apns = Some(config);
        self
    }

    pub fn webpush(mut self, config: Value) -> Self {
        self.webpush = Some(config);
        self
    }

    pub fn fcm_options(mut self, options: Value) -> Self {
        self.fcm_options = Some(options);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn notification_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.notification.extra.insert(key.into(), value);
        self
    }

    pub fn legacy_options(mut self, options: LegacyOptions) -> Self {
        self.legacy = options;
        self
    }

    /// Whether only a data payload should be sent, without a notification block
    pub(crate) fn is_data_only(&self) -> bool {
        let has_data = self
            .data
            .as_ref()
            .and_then(Value::as_object)
            .is_some_and(|data| !data.is_empty());
        has_data && !self.notification.has_display_text()
    }
}

/// Return the object behind `value`, or fail naming `field`
pub(crate) fn require_object<'a>(field: &str, value: &'a Value) -> FcmResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| FcmError::invalid_data(format!("Provided {field} is in the wrong format")))
}

/// Check the passthrough keys that carry type constraints
pub(crate) fn validate_extra(extra: &Map<String, Value>) -> FcmResult<()> {
    if let Some(ttl) = extra.get("time_to_live") {
        if !(ttl.is_u64() || ttl.is_i64()) {
            return Err(FcmError::invalid_data(
                "Provided time_to_live is not an integer",
            ));
        }
    }
    Ok(())
}

/// Merge passthrough pairs without overwriting keys set from typed fields
pub(crate) fn merge_extra(target: &mut Map<String, Value>, extra: &Map<String, Value>) {
    for (key, value) in extra {
        target.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Serializes a JSON value with object keys sorted at every level,
/// whatever ordering `serde_json::Map` was built with
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &SortedKeys(value))?;
                }
                out.end()
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(SortedKeys)),
            other => other.serialize(serializer),
        }
    }
}

/// Encode a request body as compact JSON with sorted keys
pub(crate) fn encode_payload(payload: &Value) -> FcmResult<Vec<u8>> {
    serde_json::to_vec(&SortedKeys(payload))
        .map_err(|e| FcmError::invalid_data(format!("Failed to encode payload: {e}")))
}
