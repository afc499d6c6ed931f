//! Type definitions for the SignVault SDK.
//!
//! This module contains the request and response types used by the SDK.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A successful response together with how it was obtained.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// Decoded payload.
    pub data: T,
    /// HTTP status of the response the payload came from. `304` is reported
    /// as `200` since the cached body stands in for a full response.
    pub status: u16,
    /// Whether the payload was served from the ETag cache after a 304.
    pub from_cache: bool,
    /// Current validator for the resource.
    pub etag: Option<String>,
    /// `Last-Modified` marker, if the server sent one.
    pub last_modified: Option<String>,
    /// Correlation id sent with the request.
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    /// Discard the annotations.
    pub fn into_data(self) -> T {
        self.data
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            status: self.status,
            from_cache: self.from_cache,
            etag: self.etag,
            last_modified: self.last_modified,
            request_id: self.request_id,
        }
    }
}

/// Tokens returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Bearer token for subsequent requests.
    pub access_token: String,
    /// Token used to obtain the next access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Envelope lifecycle status, as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Draft,
    Sent,
    Delivered,
    Completed,
    Declined,
    Voided,
    #[serde(other)]
    Unknown,
}

/// A signature envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Envelope ID.
    pub id: String,
    /// Subject line shown to signers.
    pub subject: String,
    /// Optional message body for signers.
    #[serde(default)]
    pub message: Option<String>,
    /// Current status.
    pub status: EnvelopeStatus,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Request to create an envelope.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvelopeRequest {
    /// Subject line.
    pub subject: String,
    /// Message body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Free-form metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// Partial update of an envelope.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnvelopeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// Query parameters for listing envelopes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelopesQuery {
    /// Filter by status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EnvelopeStatus>,
    /// Maximum number of results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Offset for pagination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// A document attached to an envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document ID.
    pub id: String,
    /// Owning envelope.
    pub envelope_id: String,
    /// File name.
    pub name: String,
    /// Page count, once the server has processed the file.
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Total number of items.
    pub total: u64,
    /// Limit used for this page.
    pub limit: u32,
    /// Offset used for this page.
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_wire_format() {
        let pair: TokenPair = serde_json::from_value(serde_json::json!({
            "accessToken": "a",
            "refreshToken": "r",
            "expiresIn": 900
        }))
        .unwrap();
        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token.as_deref(), Some("r"));
        assert_eq!(pair.expires_in, Some(900));
    }

    #[test]
    fn test_unknown_envelope_status() {
        let status: EnvelopeStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, EnvelopeStatus::Unknown);
    }

    #[test]
    fn test_list_query_skips_unset_fields() {
        let query = ListEnvelopesQuery {
            status: Some(EnvelopeStatus::Sent),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            serde_json::json!({"status": "sent"})
        );
    }
}
