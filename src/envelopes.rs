//! Envelope operations.
//!
//! This module provides the EnvelopesClient for creating, reading, updating
//! and sending signature envelopes. Reads come back annotated with their
//! cache status; see [`ApiResponse`].

use crate::client::Client;
use crate::error::Result;
use crate::transport::Request;
use crate::types::{
    ApiResponse, CreateEnvelopeRequest, Envelope, ListEnvelopesQuery, PaginatedResponse,
    UpdateEnvelopeRequest,
};
use reqwest::Method;
use serde::Serialize;

/// Client for envelope operations.
///
/// Access via `client.envelopes()`.
pub struct EnvelopesClient {
    client: Client,
}

impl EnvelopesClient {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a draft envelope.
    pub async fn create(&self, request: CreateEnvelopeRequest) -> Result<Envelope> {
        self.client.post("/envelopes", &request).await
    }

    /// Get an envelope by ID.
    ///
    /// With ETag caching enabled, a repeat call is sent as a conditional
    /// request and an unchanged envelope is served from the cache.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use signvault::{Client, ClientConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = Client::with_config(ClientConfig {
    ///         base_url: "https://api.signvault.io/v1".to_string(),
    ///         api_key: Some("sv_live_xxxxx".to_string()),
    ///         enable_etag_cache: true,
    ///         ..Default::default()
    ///     })?;
    ///
    ///     let first = client.envelopes().get("env_123").await?;
    ///     let second = client.envelopes().get("env_123").await?;
    ///     println!("{:?} -> cached: {}", first.etag, second.from_cache);
    ///     Ok(())
    /// }
    /// ```
    pub async fn get(&self, envelope_id: &str) -> Result<ApiResponse<Envelope>> {
        self.client
            .get(&format!("/envelopes/{}", envelope_id))
            .await
    }

    /// List envelopes.
    pub async fn list(
        &self,
        query: Option<ListEnvelopesQuery>,
    ) -> Result<ApiResponse<PaginatedResponse<Envelope>>> {
        let request = Request::new(Method::GET, "/envelopes").query(&query.unwrap_or_default())?;
        self.client.send(request).await
    }

    /// Update an envelope.
    ///
    /// Pass the ETag from an earlier read as `if_match` to have the server
    /// reject the update (412) when the envelope changed in between.
    pub async fn update(
        &self,
        envelope_id: &str,
        request: UpdateEnvelopeRequest,
        if_match: Option<&str>,
    ) -> Result<Envelope> {
        let request = Request::new(Method::PATCH, format!("/envelopes/{}", envelope_id))
            .json(&request)?
            .if_match(if_match);
        Ok(self.client.send(request).await?.data)
    }

    /// Send a draft envelope to its signers.
    pub async fn send(&self, envelope_id: &str) -> Result<Envelope> {
        self.client
            .post(&format!("/envelopes/{}/send", envelope_id), &serde_json::json!({}))
            .await
    }

    /// Void a sent envelope.
    pub async fn void(&self, envelope_id: &str, reason: &str) -> Result<Envelope> {
        #[derive(Serialize)]
        struct VoidRequest<'a> {
            reason: &'a str,
        }

        self.client
            .post(
                &format!("/envelopes/{}/void", envelope_id),
                &VoidRequest { reason },
            )
            .await
    }

    /// Delete a draft envelope.
    pub async fn delete(&self, envelope_id: &str) -> Result<()> {
        self.client
            .delete(&format!("/envelopes/{}", envelope_id))
            .await
    }
}
