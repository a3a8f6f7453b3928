//! Decoding of provider responses into results or typed errors

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clients::ApiResponse;
use crate::errors::{FcmError, FcmResult};

/// Successful send, in the shape of the protocol that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendResponse {
    V1(V1SendResponse),
    Legacy(LegacySendResponse),
}

impl SendResponse {
    /// Provider-assigned identifier of the (first) delivered message
    pub fn message_id(&self) -> Option<String> {
        match self {
            Self::V1(response) => Some(response.name.clone()),
            Self::Legacy(response) => response
                .message_id
                .map(|id| id.to_string())
                .or_else(|| {
                    response
                        .results
                        .iter()
                        .find_map(|result| result.message_id.clone())
                }),
        }
    }
}

/// `projects.messages.send` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V1SendResponse {
    /// `projects/{project_id}/messages/{message_id}`
    pub name: String,
}

/// Legacy send result, covering both device and topic responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacySendResponse {
    pub multicast_id: Option<i64>,
    pub success: u32,
    pub failure: u32,
    pub canonical_ids: u32,
    pub results: Vec<LegacyResult>,
    /// Set on topic sends
    pub message_id: Option<i64>,
    pub error: Option<String>,
}

/// Per-token outcome of a legacy send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyResult {
    pub message_id: Option<String>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

/// Map a final response to a decoded body or the matching error
///
/// | status | outcome |
/// |---|---|
/// | 200 with a body | decoded body |
/// | 200 without a body | `Server` |
/// | 401 | `Authentication` |
/// | 400 | `InvalidData` with the raw body text |
/// | 403 | `SenderIdMismatch` |
/// | 404 | `NotRegistered` |
/// | anything else | `Server` naming the code |
pub fn parse_response<T: DeserializeOwned>(response: &ApiResponse) -> FcmResult<T> {
    match response.status {
        StatusCode::OK => {
            if response.content_length() == Some(0) || response.body.is_empty() {
                return Err(FcmError::server_status(
                    200,
                    "FCM server connection error, the response is empty",
                ));
            }
            serde_json::from_slice(&response.body).map_err(|e| {
                FcmError::server_status(200, format!("Malformed success response: {e}"))
            })
        }
        StatusCode::UNAUTHORIZED => Err(FcmError::authentication(
            "There was an error authenticating the sender account",
        )),
        StatusCode::BAD_REQUEST => Err(FcmError::invalid_data(response.text())),
        StatusCode::FORBIDDEN => Err(FcmError::sender_id_mismatch(
            "The authenticated sender ID is different from the sender ID for the registration token.",
        )),
        StatusCode::NOT_FOUND => Err(FcmError::not_registered("Token not registered")),
        status => Err(FcmError::server_status(
            status.as_u16(),
            format!(
                "Unexpected status code {}. The server might be temporarily unavailable.",
                status.as_u16()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
    use serde_json::json;

    fn raw(status: StatusCode, body: &str) -> ApiResponse {
        ApiResponse::new(status, HeaderMap::new(), body)
    }

    fn kind_of(response: ApiResponse) -> ErrorKind {
        parse_response::<V1SendResponse>(&response).unwrap_err().kind()
    }

    #[test]
    fn test_success() {
        let response = ApiResponse::json(
            StatusCode::OK,
            &json!({"name": "projects/demo/messages/0:123"}),
        );
        let parsed: V1SendResponse = parse_response(&response).unwrap();
        assert_eq!(parsed.name, "projects/demo/messages/0:123");
    }

    #[test]
    fn test_empty_success_is_server_error() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        let response = ApiResponse::new(StatusCode::OK, headers, "");
        let err = parse_response::<V1SendResponse>(&response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_malformed_success_is_server_error() {
        assert_eq!(kind_of(raw(StatusCode::OK, "<html>")), ErrorKind::Server);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(kind_of(raw(StatusCode::UNAUTHORIZED, "")), ErrorKind::Authentication);
        assert_eq!(kind_of(raw(StatusCode::FORBIDDEN, "")), ErrorKind::SenderIdMismatch);
        assert_eq!(kind_of(raw(StatusCode::NOT_FOUND, "")), ErrorKind::NotRegistered);
        assert_eq!(kind_of(raw(StatusCode::SERVICE_UNAVAILABLE, "")), ErrorKind::Server);
        assert_eq!(kind_of(raw(StatusCode::TOO_MANY_REQUESTS, "")), ErrorKind::Server);
    }

    #[test]
    fn test_bad_request_carries_raw_body() {
        let body = r#"{"error":{"code":400,"message":"Invalid JSON payload received."}}"#;
        let err = parse_response::<V1SendResponse>(&raw(StatusCode::BAD_REQUEST, body)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.to_string(), body);
    }

    #[test]
    fn test_unexpected_status_names_code() {
        let err =
            parse_response::<V1SendResponse>(&raw(StatusCode::BAD_GATEWAY, "")).unwrap_err();
        assert!(err.to_string().contains("502"));
        assert_eq!(err.status_code(), Some(502));
    }

    #[test]
    fn test_legacy_message_id() {
        let response: LegacySendResponse = serde_json::from_value(json!({
            "multicast_id": 42,
            "success": 1,
            "failure": 1,
            "canonical_ids": 0,
            "results": [{"error": "NotRegistered"}, {"message_id": "0:abc"}]
        }))
        .unwrap();
        assert_eq!(
            SendResponse::Legacy(response).message_id().as_deref(),
            Some("0:abc")
        );

        let topic: LegacySendResponse =
            serde_json::from_value(json!({"message_id": 7})).unwrap();
        assert_eq!(SendResponse::Legacy(topic).message_id().as_deref(), Some("7"));
    }
}
