//! Error types for the FCM client
//!
//! Every failure the client can surface is a variant of [`FcmError`], so callers
//! can either match a specific condition (an unregistered device token, a sender
//! mismatch) or treat the whole family uniformly.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the FCM client
///
/// Variants mirror the outcomes of a send: caller-side problems
/// (`InvalidData`, `Configuration`), credential problems (`Authentication`),
/// and provider verdicts decoded from the HTTP response.
#[derive(Error, Debug)]
pub enum FcmError {
    /// No credential source, unreadable key file, or a final 401 from the provider
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Malformed caller input, a 400 response, or a failed token refresh
    #[error("{message}")]
    InvalidData {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The authenticated sender differs from the sender the token was registered with (403)
    #[error("Sender ID mismatch: {message}")]
    SenderIdMismatch { message: String },

    /// The device token is missing, unregistered or invalid (404)
    #[error("Not registered: {message}")]
    NotRegistered { message: String },

    /// Provider-side failure: empty or malformed success body, unexpected status
    #[error("FCM server error: {message}")]
    Server {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The HTTP attempt itself failed (connect, TLS, per-attempt timeout)
    #[error("HTTP request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

/// Convenience type alias for Results using FcmError
pub type FcmResult<T> = Result<T, FcmError>;

/// Fieldless discriminant of [`FcmError`] for broad matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    InvalidData,
    SenderIdMismatch,
    NotRegistered,
    Server,
    Configuration,
    Transport,
}

impl FcmError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    pub fn authentication_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a boxed cause (typically a failed token refresh) as invalid data
    pub fn invalid_data_with_source(message: impl Into<String>, source: BoxedSource) -> Self {
        Self::InvalidData {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn sender_id_mismatch(message: impl Into<String>) -> Self {
        Self::SenderIdMismatch {
            message: message.into(),
        }
    }

    pub fn not_registered(message: impl Into<String>) -> Self {
        Self::NotRegistered {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn server_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn configuration_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transport(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error kind without its payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::InvalidData { .. } => ErrorKind::InvalidData,
            Self::SenderIdMismatch { .. } => ErrorKind::SenderIdMismatch,
            Self::NotRegistered { .. } => ErrorKind::NotRegistered,
            Self::Server { .. } => ErrorKind::Server,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Whether resending the same payload later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Transport { .. })
    }

    /// HTTP status code the error was decoded from, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => None,
            Self::SenderIdMismatch { .. } => Some(403),
            Self::NotRegistered { .. } => Some(404),
            Self::Server { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_data_displays_raw_message() {
        let err = FcmError::invalid_data(r#"{"error":"bad"}"#);
        assert_eq!(err.to_string(), r#"{"error":"bad"}"#);
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            FcmError::authentication("no creds").kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            FcmError::not_registered("gone").kind(),
            ErrorKind::NotRegistered
        );
        assert_eq!(
            FcmError::sender_id_mismatch("other sender").status_code(),
            Some(403)
        );
        assert_eq!(FcmError::server_status(503, "down").status_code(), Some(503));
    }

    #[test]
    fn test_retryable() {
        assert!(FcmError::server("empty response").is_retryable());
        assert!(!FcmError::invalid_data("bad payload").is_retryable());
        assert!(!FcmError::not_registered("gone").is_retryable());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing key file");
        let err = FcmError::authentication_with_source("failed to load service account", io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("failed to load service account"));
    }
}
