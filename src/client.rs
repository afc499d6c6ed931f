//! SignVault API client.
//!
//! The main entry point for interacting with the SignVault API.

use crate::auth::AuthClient;
use crate::cache::{CacheConfig, EtagCache};
use crate::credentials::CredentialStore;
use crate::documents::DocumentsClient;
use crate::envelopes::EnvelopesClient;
use crate::error::{Result, SignVaultError};
use crate::retry::RetryPolicy;
use crate::transport::{Request, Transport};
use crate::types::ApiResponse;
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// SignVault API client.
///
/// Cloning is cheap; clones share the HTTP connection pool, credentials and
/// ETag cache.
///
/// # Example
///
/// ```rust,no_run
/// use signvault::Client;
/// use signvault::types::CreateEnvelopeRequest;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new("https://api.signvault.io/v1", "sv_live_xxxxx")?;
///
///     let envelope = client.envelopes().create(CreateEnvelopeRequest {
///         subject: "Please sign".to_string(),
///         ..Default::default()
///     }).await?;
///
///     let fetched = client.envelopes().get(&envelope.id).await?;
///     println!("{} (from cache: {})", fetched.data.subject, fetched.from_cache);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) transport: Arc<Transport>,
}

/// Configuration options for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API, e.g. `https://api.signvault.io/v1`. Required.
    pub base_url: String,
    /// Bearer access token.
    pub access_token: Option<String>,
    /// Refresh token used to renew `access_token` on 401.
    pub refresh_token: Option<String>,
    /// API key, sent as `X-API-Key` when no access token is set.
    pub api_key: Option<String>,
    /// Request timeout (default: 30 seconds).
    pub timeout: Option<Duration>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Enable ETag conditional caching of GET responses (default: false).
    pub enable_etag_cache: bool,
    /// ETag cache tuning.
    pub cache: CacheConfig,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
    /// Log request, response and retry events at debug level.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            access_token: None,
            refresh_token: None,
            api_key: None,
            timeout: None,
            user_agent: None,
            enable_etag_cache: false,
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            debug: false,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Client {
    /// Create a client authenticated with an API key.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use signvault::Client;
    ///
    /// let client = Client::new("https://api.signvault.io/v1", "sv_live_xxxxx").unwrap();
    /// ```
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig {
            base_url: base_url.into(),
            api_key: Some(api_key.into()),
            ..Default::default()
        })
    }

    /// Create a client from a configuration.
    ///
    /// Fails when the base URL is missing or invalid, or when neither an
    /// access token nor an API key is given.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use signvault::{Client, ClientConfig};
    /// use std::time::Duration;
    ///
    /// let client = Client::with_config(ClientConfig {
    ///     base_url: "https://api.signvault.io/v1".to_string(),
    ///     access_token: Some("eyJhbGci...".to_string()),
    ///     refresh_token: Some("rt_xxxxx".to_string()),
    ///     timeout: Some(Duration::from_secs(60)),
    ///     enable_etag_cache: true,
    ///     ..Default::default()
    /// }).unwrap();
    /// ```
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SignVaultError::Config("base_url is required".to_string()));
        }
        reqwest::Url::parse(&base_url)
            .map_err(|e| SignVaultError::Config(format!("invalid base_url {}: {}", base_url, e)))?;

        let access_token = non_empty(config.access_token);
        let api_key = non_empty(config.api_key);
        if access_token.is_none() && api_key.is_none() {
            return Err(SignVaultError::Config(
                "either an access token or an API key is required".to_string(),
            ));
        }

        let timeout = config
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let user_agent = config
            .user_agent
            .unwrap_or_else(|| format!("signvault-rust/{}", env!("CARGO_PKG_VERSION")));

        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SignVaultError::Config(format!("failed to create HTTP client: {}", e)))?;

        let credentials =
            CredentialStore::new(access_token, non_empty(config.refresh_token), api_key);
        let cache = config
            .enable_etag_cache
            .then(|| EtagCache::new(config.cache));

        Ok(Self {
            transport: Arc::new(Transport::new(
                http,
                base_url,
                credentials,
                cache,
                config.retry,
                config.debug,
            )),
        })
    }

    /// Get the base URL for the API.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// The ETag cache, when caching is enabled.
    pub fn cache(&self) -> Option<&EtagCache> {
        self.transport.cache.as_ref()
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        if let Some(cache) = self.cache() {
            cache.clear();
        }
    }

    /// Current bearer access token.
    pub fn access_token(&self) -> Option<String> {
        self.transport.credentials.access_token()
    }

    /// Replace the bearer tokens, e.g. with ones obtained out of band.
    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: Option<String>) {
        self.transport
            .credentials
            .set_tokens(access_token.into(), refresh_token);
    }

    /// Forget the bearer tokens. An API key, if configured, is still sent.
    pub fn clear_tokens(&self) {
        self.transport.credentials.clear_tokens();
    }

    /// Get the auth client for login, refresh and logout.
    pub fn auth(&self) -> AuthClient {
        AuthClient::new(self.clone())
    }

    /// Get the envelopes client.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use signvault::Client;
    ///
    /// let client = Client::new("https://api.signvault.io/v1", "sv_live_xxxxx").unwrap();
    /// let envelopes = client.envelopes();
    /// ```
    pub fn envelopes(&self) -> EnvelopesClient {
        EnvelopesClient::new(self.clone())
    }

    /// Get the documents client.
    pub fn documents(&self) -> DocumentsClient {
        DocumentsClient::new(self.clone())
    }

    /// Send a request through the transport and decode the payload.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> Result<ApiResponse<T>> {
        let mut response = self.transport.execute(request).await?;
        let data = serde_json::from_value(std::mem::take(&mut response.data))
            .map_err(|e| SignVaultError::Decode(e.to_string()))?;
        Ok(response.map(|_| data))
    }

    /// Make an authenticated GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.send(Request::new(Method::GET, path)).await
    }

    /// Make an authenticated POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let request = Request::new(Method::POST, path).json(body)?;
        Ok(self.send(request).await?.data)
    }

    /// Make an authenticated DELETE request, ignoring any response body.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        self.transport
            .execute(Request::new(Method::DELETE, path))
            .await
            .map(|_| ())
    }
}
