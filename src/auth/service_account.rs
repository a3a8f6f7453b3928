use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::{AccessToken, Credentials};
use crate::config::FCM_SCOPE;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Google service account key, as downloaded from the cloud console
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Read and parse a key file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid service account file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let key: Self =
            serde_json::from_str(content).context("Failed to parse service account JSON")?;
        if let Some(key_type) = &key.key_type {
            if key_type != "service_account" {
                anyhow::bail!("Expected a service_account key, got '{}'", key_type);
            }
        }
        Ok(key)
    }
}

/// JWT claims for the OAuth2 JWT bearer grant
#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Credentials minted from a service account key via a signed JWT assertion
pub struct ServiceAccountCredentials {
    key: ServiceAccountKey,
    scope: String,
    http_client: reqwest::Client,
}

impl ServiceAccountCredentials {
    pub fn new(key: ServiceAccountKey, http_client: reqwest::Client) -> Self {
        Self {
            key,
            scope: FCM_SCOPE.to_string(),
            http_client,
        }
    }

    pub fn from_file(path: impl AsRef<Path>, http_client: reqwest::Client) -> Result<Self> {
        Ok(Self::new(ServiceAccountKey::from_file(path)?, http_client))
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    /// Build the signed assertion exchanged at the token endpoint
    fn signed_assertion(&self) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            sub: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("Failed to parse service account private key")?;

        encode(&header, &claims, &encoding_key).context("Failed to encode JWT assertion")
    }
}

#[async_trait]
impl Credentials for ServiceAccountCredentials {
    fn project_id(&self) -> Option<String> {
        self.key.project_id.clone()
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let assertion = self.signed_assertion()?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await
            .context("Failed to request access token")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Token request failed: {} - {}", status, error_text);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let expires_at = token
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        debug!(
            client_email = %self.key.client_email,
            ?expires_at,
            "Exchanged service account assertion for access token"
        );

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}
