//! Document operations.
//!
//! Documents live under their envelope, so deleting one also invalidates the
//! cached document list of that envelope.

use crate::client::Client;
use crate::error::Result;
use crate::types::{ApiResponse, Document};

/// Client for document operations.
///
/// Access via `client.documents()`.
pub struct DocumentsClient {
    client: Client,
}

impl DocumentsClient {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// List the documents attached to an envelope.
    pub async fn list(&self, envelope_id: &str) -> Result<ApiResponse<Vec<Document>>> {
        self.client
            .get(&format!("/envelopes/{}/documents", envelope_id))
            .await
    }

    /// Get one document's metadata.
    pub async fn get(&self, envelope_id: &str, document_id: &str) -> Result<ApiResponse<Document>> {
        self.client
            .get(&format!("/envelopes/{}/documents/{}", envelope_id, document_id))
            .await
    }

    /// Remove a document from a draft envelope.
    pub async fn delete(&self, envelope_id: &str, document_id: &str) -> Result<()> {
        self.client
            .delete(&format!("/envelopes/{}/documents/{}", envelope_id, document_id))
            .await
    }
}
