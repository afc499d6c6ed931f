//! # SignVault Rust SDK
//!
//! Rust client for the SignVault digital signature API.
//!
//! All calls go through one shared transport per [`Client`], which takes care
//! of the cross-cutting concerns:
//!
//! - **Authentication**: bearer token or API key on every request
//! - **Token refresh**: a 401 triggers a single refresh shared by all
//!   concurrent callers, then the original request is replayed
//! - **Retries**: network failures, 429 and 502/503/504 are retried up to five
//!   times with Fibonacci backoff, honoring `Retry-After` on 429
//! - **ETag caching**: opt-in conditional GETs; a 304 is answered from the
//!   cache and mutations invalidate the affected paths
//! - **Correlation**: every request carries an `X-Request-ID`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signvault::{Client, ClientConfig, types::CreateEnvelopeRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::with_config(ClientConfig {
//!         base_url: "https://api.signvault.io/v1".to_string(),
//!         api_key: Some("sv_live_xxxxx".to_string()),
//!         enable_etag_cache: true,
//!         ..Default::default()
//!     })?;
//!
//!     let envelope = client.envelopes().create(CreateEnvelopeRequest {
//!         subject: "NDA".to_string(),
//!         ..Default::default()
//!     }).await?;
//!     client.envelopes().send(&envelope.id).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, SignVaultError>`. Failed requests carry a
//! normalized [`ApiError`] with classification helpers:
//!
//! ```rust,no_run
//! use signvault::Client;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new("https://api.signvault.io/v1", "sv_live_xxxxx").unwrap();
//!
//!     match client.envelopes().get("env_123").await {
//!         Ok(envelope) => println!("status: {:?}", envelope.data.status),
//!         Err(e) if e.api().is_some_and(|a| a.is_not_found()) => println!("no such envelope"),
//!         Err(e) => println!("Error: {}", e),
//!     }
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod documents;
pub mod envelopes;
pub mod error;
pub mod retry;
pub mod transport;
pub mod types;

// Re-export main types at the crate root
pub use cache::{CacheConfig, CacheEntry, CacheStats, EtagCache};
pub use client::{Client, ClientConfig};
pub use error::{ApiError, RateLimitInfo, Result, SignVaultError, ValidationError};
pub use retry::RetryPolicy;

// Re-export types module for easy access
pub use types::{
    ApiResponse, CreateEnvelopeRequest, Document, Envelope, EnvelopeStatus, ListEnvelopesQuery,
    LoginRequest, PaginatedResponse, TokenPair, UpdateEnvelopeRequest,
};
