//! FCM Push Library
//!
//! A Firebase Cloud Messaging client. It sends push notifications through the
//! OAuth2 v1 API or the legacy key-based API, keeps one shared bearer token
//! fresh across concurrent senders, and resends on provider rate limiting.

pub mod auth;
pub mod clients;
pub mod config;
pub mod errors;
pub mod message;
pub mod response;

// Re-export commonly used types for convenience
pub use auth::{
    AccessToken, CredentialResolver, Credentials, ServiceAccountCredentials, ServiceAccountKey,
    TokenManager,
};
pub use clients::{BlockingFcmNotification, FcmNotification, HttpTransport, PushApi};
pub use config::{FcmClientConfig, ProxyConfig};
pub use errors::{ErrorKind, FcmError, FcmResult};
pub use message::{LegacyOptions, Message, Notification, Target};
pub use response::{LegacyResult, LegacySendResponse, SendResponse, V1SendResponse};
