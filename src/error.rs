//! Error types for the SignVault SDK.
//!
//! Every transport failure, whether the server answered with a non-2xx status
//! or the request never got a response, is normalized into one [`ApiError`]
//! shape. [`SignVaultError`] wraps it together with the few failures that
//! happen on the client side.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for SignVault operations.
pub type Result<T> = std::result::Result<T, SignVaultError>;

/// Status used for failures that never produced an HTTP response.
pub const NETWORK_STATUS: u16 = 0;

/// Low-level codes that mark a failure as network-class.
pub const NETWORK_ERROR_CODES: &[&str] = &[
    "ECONNABORTED",
    "ECONNREFUSED",
    "ECONNRESET",
    "ENOTFOUND",
    "ETIMEDOUT",
    "ERR_NETWORK",
];

const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
const RETRY_AFTER: &str = "retry-after";

/// Errors that can occur when using the SignVault SDK.
#[derive(Error, Debug)]
pub enum SignVaultError {
    /// Normalized transport or API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The client was constructed with an unusable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The response payload did not match the requested type.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl SignVaultError {
    /// Returns the normalized API error, if this is one.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            SignVaultError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the transport would retry this error.
    pub fn is_retryable(&self) -> bool {
        self.api().is_some_and(ApiError::is_retryable)
    }

    /// Returns true if this is an authentication error (401).
    pub fn is_auth_error(&self) -> bool {
        self.api().is_some_and(ApiError::is_authentication_error)
    }

    /// Returns the HTTP status code if available.
    ///
    /// Network failures report `Some(0)`.
    pub fn status_code(&self) -> Option<u16> {
        self.api().map(|e| e.status)
    }
}

/// A single field-level validation failure reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Field the error refers to, when the server names one.
    #[serde(default)]
    pub field: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
    /// Machine-readable code.
    #[serde(default)]
    pub code: Option<String>,
}

/// Rate-limit telemetry extracted from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Window reset time in epoch seconds.
    pub reset: Option<u64>,
}

impl RateLimitInfo {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_u64(headers, RATE_LIMIT_LIMIT)?;
        let remaining = header_u64(headers, RATE_LIMIT_REMAINING)?;
        Some(Self {
            limit,
            remaining,
            reset: header_u64(headers, RATE_LIMIT_RESET),
        })
    }
}

/// Uniform error shape for every failed request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("API error ({status} {status_text}): {message}")]
pub struct ApiError {
    /// Human-readable message.
    pub message: String,
    /// HTTP status code, `0` for network failures.
    pub status: u16,
    /// HTTP reason phrase, or the network error code.
    pub status_text: String,
    /// Machine-readable error code.
    pub code: Option<String>,
    /// Structured validation failures.
    pub validation_errors: Vec<ValidationError>,
    /// Rate-limit headers, when the server sent them.
    pub rate_limit: Option<RateLimitInfo>,
    /// Raw `Retry-After` header of a 429 response.
    pub retry_after: Option<String>,
    /// Correlation id of the request that failed.
    pub request_id: Option<String>,
}

impl ApiError {
    /// Normalize a non-2xx response.
    ///
    /// The message is taken from the first rule that yields a non-empty string:
    ///
    /// 1. `message`
    /// 2. `error` as a string, or `error.message` when it is an object
    /// 3. `detail`
    /// 4. `error_description`
    ///
    /// then the reason phrase, then a generic `Request failed with status N`.
    pub fn from_response(status: u16, headers: &HeaderMap, body: &[u8]) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        let json: Option<Value> = serde_json::from_slice(body).ok();

        let message = json
            .as_ref()
            .and_then(extract_message)
            .or_else(|| (!status_text.is_empty()).then(|| status_text.clone()))
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        let retry_after = if status == 429 {
            header_str(headers, RETRY_AFTER).map(str::to_string)
        } else {
            None
        };

        Self {
            message,
            status,
            status_text,
            code: json.as_ref().and_then(extract_code),
            validation_errors: json.as_ref().map(extract_validation_errors).unwrap_or_default(),
            rate_limit: RateLimitInfo::from_headers(headers),
            retry_after,
            request_id: None,
        }
    }

    /// Normalize a failure that produced no response.
    pub fn network(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: NETWORK_STATUS,
            status_text: code.to_string(),
            code: Some(code.to_string()),
            validation_errors: Vec::new(),
            rate_limit: None,
            retry_after: None,
            request_id: None,
        }
    }

    /// Normalize a low-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            "ETIMEDOUT"
        } else if err.is_connect() {
            "ECONNREFUSED"
        } else if err.is_body() || err.is_decode() {
            "ECONNRESET"
        } else {
            "ERR_NETWORK"
        };
        Self::network(code, err.to_string())
    }

    pub(crate) fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    /// 401.
    pub fn is_authentication_error(&self) -> bool {
        self.status == 401
    }

    /// 403.
    pub fn is_authorization_error(&self) -> bool {
        self.status == 403
    }

    /// 404.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// 400 or 422.
    pub fn is_validation_error(&self) -> bool {
        matches!(self.status, 400 | 422)
    }

    /// 429.
    pub fn is_rate_limit_error(&self) -> bool {
        self.status == 429
    }

    /// Any 5xx.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// No response was received, or the failure carries a network error code.
    pub fn is_network_error(&self) -> bool {
        self.status == NETWORK_STATUS
            || self
                .code
                .as_deref()
                .is_some_and(|c| NETWORK_ERROR_CODES.contains(&c))
    }

    /// Network failures, 429, and 502/503/504 are retried by the transport.
    pub fn is_retryable(&self) -> bool {
        self.is_network_error()
            || self.is_rate_limit_error()
            || matches!(self.status, 502..=504)
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(non_empty)
        .or_else(|| {
            body.get("error").and_then(|e| match e {
                Value::Object(_) => e.get("message").and_then(non_empty),
                other => non_empty(other),
            })
        })
        .or_else(|| body.get("detail").and_then(non_empty))
        .or_else(|| body.get("error_description").and_then(non_empty))
}

fn extract_code(body: &Value) -> Option<String> {
    body.get("code")
        .and_then(non_empty)
        .or_else(|| body.get("error").and_then(|e| e.get("code")).and_then(non_empty))
}

fn extract_validation_errors(body: &Value) -> Vec<ValidationError> {
    body.get("errors")
        .or_else(|| body.get("validationErrors"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(message) => Some(ValidationError {
                        field: None,
                        message: message.clone(),
                        code: None,
                    }),
                    other => serde_json::from_value(other.clone()).ok(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_message_priority() {
        let headers = HeaderMap::new();

        let err = ApiError::from_response(
            400,
            &headers,
            &body(serde_json::json!({"message": "first", "error": "second", "detail": "third"})),
        );
        assert_eq!(err.message, "first");

        let err = ApiError::from_response(
            400,
            &headers,
            &body(serde_json::json!({"error": "second", "detail": "third"})),
        );
        assert_eq!(err.message, "second");

        let err = ApiError::from_response(
            400,
            &headers,
            &body(serde_json::json!({"error": {"code": "bad", "message": "nested"}})),
        );
        assert_eq!(err.message, "nested");
        assert_eq!(err.code.as_deref(), Some("bad"));

        let err = ApiError::from_response(400, &headers, &body(serde_json::json!({"detail": "third"})));
        assert_eq!(err.message, "third");

        let err = ApiError::from_response(
            400,
            &headers,
            &body(serde_json::json!({"error_description": "fourth"})),
        );
        assert_eq!(err.message, "fourth");
    }

    #[test]
    fn test_message_falls_back_to_status_text() {
        let err = ApiError::from_response(404, &HeaderMap::new(), b"not json");
        assert_eq!(err.message, "Not Found");
        assert_eq!(err.status_text, "Not Found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_errors() {
        let err = ApiError::from_response(
            422,
            &HeaderMap::new(),
            &body(serde_json::json!({
                "message": "Validation failed",
                "errors": [
                    {"field": "email", "message": "is invalid", "code": "format"},
                    "name is required"
                ]
            })),
        );
        assert!(err.is_validation_error());
        assert_eq!(err.validation_errors.len(), 2);
        assert_eq!(err.validation_errors[0].field.as_deref(), Some("email"));
        assert_eq!(err.validation_errors[1].message, "name is required");
    }

    #[test]
    fn test_rate_limit_metadata() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("100"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        headers.insert("retry-after", HeaderValue::from_static("3"));

        let err = ApiError::from_response(429, &headers, b"");
        assert!(err.is_rate_limit_error());
        assert!(err.is_retryable());
        assert_eq!(
            err.rate_limit,
            Some(RateLimitInfo {
                limit: 100,
                remaining: 0,
                reset: Some(1_700_000_000),
            })
        );
        assert_eq!(err.retry_after.as_deref(), Some("3"));
    }

    #[test]
    fn test_retry_after_ignored_outside_429() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));
        let err = ApiError::from_response(503, &headers, b"");
        assert!(err.retry_after.is_none());
    }

    #[test]
    fn test_classification() {
        let headers = HeaderMap::new();
        let status = |s| ApiError::from_response(s, &headers, b"");

        assert!(status(401).is_authentication_error());
        assert!(status(403).is_authorization_error());
        assert!(status(400).is_validation_error());
        assert!(status(500).is_server_error());
        assert!(!status(500).is_retryable());
        assert!(!status(501).is_retryable());
        for s in [502, 503, 504, 429] {
            assert!(status(s).is_retryable(), "{} should be retryable", s);
        }
        for s in [400, 401, 403, 404, 422] {
            assert!(!status(s).is_retryable(), "{} should not be retryable", s);
        }

        let net = ApiError::network("ETIMEDOUT", "timed out");
        assert_eq!(net.status, NETWORK_STATUS);
        assert!(net.is_network_error());
        assert!(net.is_retryable());
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("10"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("9"));
        let raw = body(serde_json::json!({"message": "boom", "code": "E1"}));

        let a = ApiError::from_response(500, &headers, &raw);
        let b = ApiError::from_response(500, &headers, &raw);
        assert_eq!(a.status, b.status);
        assert_eq!(a.message, b.message);
        assert_eq!(a.code, b.code);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sdk_error_display_and_predicates() {
        let err: SignVaultError =
            ApiError::from_response(404, &HeaderMap::new(), &body(serde_json::json!({"message": "gone"})))
                .into();
        assert_eq!(err.to_string(), "API error (404 Not Found): gone");
        assert_eq!(err.status_code(), Some(404));
        assert!(!err.is_retryable());

        let config = SignVaultError::Config("missing credentials".to_string());
        assert_eq!(config.status_code(), None);
        assert!(!config.is_auth_error());
    }
}
