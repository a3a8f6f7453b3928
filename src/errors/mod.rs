//! Centralized error handling module
//!
//! A single typed error family for the FCM client. Transient provider
//! conditions (rate limiting, expired access tokens) are recovered inside the
//! dispatcher and never surface here on eventual success.

pub mod types;

pub use types::{ErrorKind, FcmError, FcmResult};

/// Convert from anyhow::Error so custom credential providers can use anyhow
impl From<anyhow::Error> for FcmError {
    fn from(err: anyhow::Error) -> Self {
        FcmError::InvalidData {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}
