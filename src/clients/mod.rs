//! Push clients and the HTTP plumbing underneath them
//!
//! ## Architecture
//!
//! - **FcmNotification**: async client; builds, sends and decodes messages
//! - **BlockingFcmNotification**: blocking wrapper for thread-per-request callers
//! - **PushApi**: one implementation per protocol generation ([`V1Api`], [`LegacyApi`])
//! - **Dispatcher**: the resend loop for rate limiting and expired tokens
//! - **HttpTransport**: one POST; [`ReqwestTransport`] in production
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fcm_push::clients::FcmNotification;
//! use fcm_push::{FcmClientConfig, Message};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), fcm_push::FcmError> {
//! let config = FcmClientConfig::service_account("service-account.json")
//!     .with_max_concurrent_requests(32);
//! let client = FcmNotification::new(config)?;
//!
//! client
//!     .notify_topic(Some("news"), None, Message::new().title("Hi"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod fcm;
pub mod legacy;
pub mod traits;
pub mod transport;
pub mod v1;

pub use dispatcher::{Authorization, Dispatcher};
pub use fcm::{BlockingFcmNotification, FcmNotification};
pub use legacy::{build_legacy_payload, LegacyApi, MAX_RECIPIENTS};
pub use traits::{HttpTransport, PushApi};
pub use transport::{ApiResponse, ReqwestTransport, ACCESS_TOKEN_EXPIRED};
pub use v1::{build_v1_payload, V1Api};
