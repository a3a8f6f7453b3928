use crate::errors::{FcmError, FcmResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Base of the v1 send endpoint; the project id and `/messages:send` are appended
pub const DEFAULT_ENDPOINT_BASE: &str = "https://fcm.googleapis.com/v1/projects";

/// Fixed endpoint of the key-based legacy protocol
pub const DEFAULT_LEGACY_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// OAuth2 scope requested for service account tokens
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Configuration for an [`FcmNotification`](crate::FcmNotification) client
///
/// Every option is optional; unset options mean no proxy and no per-attempt
/// timeout. Opaque credential objects are not part of this struct since they
/// cannot be serialized; pass them to
/// [`FcmNotification::with_credentials`](crate::FcmNotification::with_credentials).
///
/// # Example
///
/// ```rust
/// use fcm_push::FcmClientConfig;
///
/// let config = FcmClientConfig::from_toml_str(r#"
///     service_account_file = "/etc/fcm/service-account.json"
///     project_id = "my-project"
///     timeout_secs = 10
///
///     [proxy]
///     https = "http://proxy.internal:3128"
/// "#).unwrap();
/// assert_eq!(config.project_id.as_deref(), Some("my-project"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FcmClientConfig {
    pub service_account_file: Option<PathBuf>,
    pub project_id: Option<String>,
    pub proxy: Option<ProxyConfig>,
    /// Bounds each individual HTTP attempt, not the whole retry loop
    pub timeout_secs: Option<u64>,
    pub endpoint_base: String,
    /// Selects the legacy `key=` protocol instead of OAuth2 v1
    pub legacy_api_key: Option<String>,
    pub legacy_endpoint: String,
    /// In-flight limit for batch sends; `None` issues every payload at once
    pub max_concurrent_requests: Option<usize>,
    pub user_agent: Option<String>,
}

/// Proxy settings, keyed by the scheme of the proxied request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl Default for FcmClientConfig {
    fn default() -> Self {
        Self {
            service_account_file: None,
            project_id: None,
            proxy: None,
            timeout_secs: None,
            endpoint_base: DEFAULT_ENDPOINT_BASE.to_string(),
            legacy_api_key: None,
            legacy_endpoint: DEFAULT_LEGACY_ENDPOINT.to_string(),
            max_concurrent_requests: None,
            user_agent: Some(concat!("fcm-push/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl FcmClientConfig {
    /// Config for the v1 API backed by a service account key file
    pub fn service_account(path: impl Into<PathBuf>) -> Self {
        Self {
            service_account_file: Some(path.into()),
            ..Default::default()
        }
    }

    /// Config for the legacy key-based API
    pub fn legacy(api_key: impl Into<String>) -> Self {
        Self {
            legacy_api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = Some(limit);
        self
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> FcmResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FcmError::configuration_with_source(
                format!("Failed to read config file {}", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> FcmResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FcmError::configuration_with_source("Failed to parse config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Per-attempt timeout as a `Duration`
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Whether the legacy key-based protocol is selected
    pub fn is_legacy(&self) -> bool {
        self.legacy_api_key.is_some()
    }

    /// Check endpoint and proxy URLs and numeric limits
    pub fn validate(&self) -> FcmResult<()> {
        parse_url("endpoint_base", &self.endpoint_base)?;
        parse_url("legacy_endpoint", &self.legacy_endpoint)?;

        if let Some(proxy) = &self.proxy {
            if let Some(http) = &proxy.http {
                parse_url("proxy.http", http)?;
            }
            if let Some(https) = &proxy.https {
                parse_url("proxy.https", https)?;
            }
        }

        if self.max_concurrent_requests == Some(0) {
            return Err(FcmError::configuration(
                "max_concurrent_requests must be greater than zero",
            ));
        }

        if let Some(key) = &self.legacy_api_key {
            if key.trim().is_empty() {
                return Err(FcmError::configuration("legacy_api_key cannot be empty"));
            }
        }

        Ok(())
    }
}

fn parse_url(key: &str, value: &str) -> FcmResult<Url> {
    Url::parse(value)
        .map_err(|e| FcmError::configuration_with_source(format!("Invalid URL for '{key}': {value}"), e))
}
