//! Transport core.
//!
//! Every call issued by the resource clients goes through [`Transport::execute`],
//! which runs one logical request through this state machine:
//!
//! ```text
//! Initial -> Sent -> Succeeded
//!                 -> ConditionalHit            (304 with a cached entry)
//!                 -> RetryScheduled -> Sent    (network, 429, 502-504)
//!                 -> RefreshPending -> Sent    (401 with a refresh token)
//!                 -> Failed
//! ```
//!
//! The request phase attaches the correlation id, credentials and, for
//! cached GETs, `If-None-Match`. The response phase updates or invalidates
//! the ETag cache and decides the next transition.

use crate::cache::{CacheEntry, EtagCache, MAX_TTL};
use crate::credentials::{AuthScheme, CredentialStore, RefreshOutcome};
use crate::error::{ApiError, Result, SignVaultError};
use crate::retry::{RetryPolicy, RetryState};
use crate::types::{ApiResponse, TokenPair};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client as HttpClient, Method};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Correlation header attached to every request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header used for API key authentication.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Token refresh endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// One logical request. Cloned state survives retries and refresh-replays.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) if_match: Option<String>,
    pub(crate) request_id: Option<String>,
    /// Set once the request has been replayed after a token refresh.
    pub(crate) refresh_replay: bool,
    /// Auth endpoints must not trigger a refresh themselves.
    pub(crate) skip_refresh: bool,
}

impl Request {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            if_match: None,
            request_id: None,
            refresh_replay: false,
            skip_refresh: false,
        }
    }

    pub(crate) fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| SignVaultError::Decode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Flatten a serializable struct into query pairs. `None` fields are skipped.
    pub(crate) fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Result<Self> {
        let value =
            serde_json::to_value(query).map_err(|e| SignVaultError::Decode(e.to_string()))?;
        if let Value::Object(map) = value {
            for (key, value) in map {
                let value = match value {
                    Value::Null => continue,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                self.query.push((key, value));
            }
        }
        Ok(self)
    }

    pub(crate) fn if_match(mut self, etag: Option<&str>) -> Self {
        self.if_match = etag.map(str::to_string);
        self
    }

    pub(crate) fn skip_refresh(mut self) -> Self {
        self.skip_refresh = true;
        self
    }

    fn is_mutation(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }
}

/// Cache key for a request path: no query, no fragment, no trailing slash.
pub fn cache_key(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Containing collection of `key`, i.e. `key` with its last `/segment` removed.
///
/// This is a heuristic: for nested or non-hierarchical paths it may invalidate
/// too much or too little.
pub fn parent_key(key: &str) -> Option<String> {
    key.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
        .map(str::to_string)
}

fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .find_map(|directive| directive.trim().strip_prefix("max-age="))
        .and_then(|seconds| seconds.trim().parse().ok())
        .map(|seconds| Duration::from_secs(seconds).min(MAX_TTL))
}

// Bodies that are not JSON (e.g. a bare `OK`) are kept as a JSON string.
fn body_value(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

enum Step {
    Retry(Duration),
    Replay,
    Fail(ApiError),
}

/// Shared HTTP machinery of one client.
pub(crate) struct Transport {
    http: HttpClient,
    base_url: String,
    pub(crate) credentials: CredentialStore,
    pub(crate) cache: Option<EtagCache>,
    retry: RetryPolicy,
    debug: bool,
}

impl Transport {
    pub(crate) fn new(
        http: HttpClient,
        base_url: String,
        credentials: CredentialStore,
        cache: Option<EtagCache>,
        retry: RetryPolicy,
        debug: bool,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            cache,
            retry,
            debug,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run `request` to completion: success, cache hit, or a normalized error.
    pub(crate) async fn execute(&self, mut request: Request) -> Result<ApiResponse<Value>> {
        let request_id = request
            .request_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let mut retry = RetryState::new(self.retry.max_attempts);

        loop {
            let conditional = self.conditional_entry(&request);
            let etag = conditional.as_ref().map(|entry| entry.etag.as_str());

            let error = match self.dispatch(&request, &request_id, etag).await {
                Ok(raw) if (200..300).contains(&raw.status) => {
                    return Ok(self.on_success(&request, &request_id, raw));
                }
                Ok(raw) if raw.status == 304 => match conditional {
                    Some(entry) => return Ok(self.on_not_modified(&request, &request_id, entry)),
                    None => ApiError::from_response(raw.status, &raw.headers, &raw.body),
                },
                Ok(raw) => ApiError::from_response(raw.status, &raw.headers, &raw.body),
                Err(err) => err,
            }
            .with_request_id(&request_id);

            match self.next_step(&request, &mut retry, error).await {
                Step::Retry(delay) => tokio::time::sleep(delay).await,
                Step::Replay => request.refresh_replay = true,
                Step::Fail(err) => return Err(err.into()),
            }
        }
    }

    fn conditional_entry(&self, request: &Request) -> Option<CacheEntry> {
        if request.method != Method::GET {
            return None;
        }
        self.cache.as_ref()?.get(&cache_key(&request.path))
    }

    /// Send one attempt. Never retries.
    async fn dispatch(
        &self,
        request: &Request,
        request_id: &str,
        if_none_match: Option<&str>,
    ) -> std::result::Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(REQUEST_ID_HEADER, request_id)
            .header(header::ACCEPT, "application/json");

        builder = match self.credentials.auth_scheme() {
            Some(AuthScheme::Bearer(token)) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
            Some(AuthScheme::ApiKey(key)) => builder.header(API_KEY_HEADER, key),
            None => builder,
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(etag) = if_none_match {
            builder = builder.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(etag) = &request.if_match {
            builder = builder.header(header::IF_MATCH, etag.as_str());
        }

        if self.debug {
            debug!(
                request_id,
                method = %request.method,
                path = %request.path,
                conditional = if_none_match.is_some(),
                replay = request.refresh_replay,
                "sending request"
            );
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e))?
            .to_vec();

        if self.debug {
            debug!(request_id, status, bytes = body.len(), "received response");
        }

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    fn on_success(
        &self,
        request: &Request,
        request_id: &str,
        raw: RawResponse,
    ) -> ApiResponse<Value> {
        let data = body_value(&raw.body);
        let etag = header_string(&raw.headers, header::ETAG);
        let last_modified = header_string(&raw.headers, header::LAST_MODIFIED);

        if let Some(cache) = &self.cache {
            let key = cache_key(&request.path);
            if request.method == Method::GET {
                if let Some(etag) = &etag {
                    let ttl = raw
                        .headers
                        .get(header::CACHE_CONTROL)
                        .and_then(|v| v.to_str().ok())
                        .and_then(max_age);
                    cache.set(&key, etag.clone(), data.clone(), ttl, last_modified.clone());
                }
            } else if request.is_mutation() {
                cache.invalidate(&key);
                if let Some(parent) = parent_key(&key) {
                    cache.invalidate(&parent);
                }
                if self.debug {
                    debug!(request_id, key = %key, "invalidated cache entries");
                }
            }
        }

        ApiResponse {
            data,
            status: raw.status,
            from_cache: false,
            etag,
            last_modified,
            request_id: request_id.to_string(),
        }
    }

    fn on_not_modified(
        &self,
        request: &Request,
        request_id: &str,
        entry: CacheEntry,
    ) -> ApiResponse<Value> {
        if self.debug {
            debug!(request_id, path = %request.path, etag = %entry.etag, "served from cache");
        }
        ApiResponse {
            data: entry.data,
            status: 200,
            from_cache: true,
            etag: Some(entry.etag),
            last_modified: entry.last_modified,
            request_id: request_id.to_string(),
        }
    }

    async fn next_step(&self, request: &Request, retry: &mut RetryState, error: ApiError) -> Step {
        if error.is_retryable() && !request.refresh_replay && retry.can_retry() {
            let attempt = retry.advance();
            let delay = self.retry.delay_for(attempt, &error);
            if self.debug {
                debug!(
                    request_id = request.request_id.as_deref().unwrap_or_default(),
                    attempt = attempt + 1,
                    status = error.status,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                );
            }
            return Step::Retry(delay);
        }

        if error.is_authentication_error() && !request.refresh_replay && !request.skip_refresh {
            let outcome = self
                .credentials
                .refresh_with(|token| self.refresh_tokens(token))
                .await;
            return match outcome {
                RefreshOutcome::Refreshed(_) => {
                    if self.debug {
                        debug!(
                            request_id = request.request_id.as_deref().unwrap_or_default(),
                            "replaying request with refreshed token"
                        );
                    }
                    Step::Replay
                }
                RefreshOutcome::NoRefreshToken => Step::Fail(error),
                RefreshOutcome::Failed(err) => Step::Fail(err),
            };
        }

        Step::Fail(error)
    }

    /// Exchange a refresh token for a new pair. Bypasses retry and refresh.
    pub(crate) async fn refresh_tokens(
        &self,
        refresh_token: String,
    ) -> std::result::Result<TokenPair, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let request = Request {
            body: Some(serde_json::json!({ "refreshToken": refresh_token })),
            ..Request::new(Method::POST, REFRESH_PATH).skip_refresh()
        };

        let raw = self.dispatch(&request, &request_id, None).await?;
        let result = if (200..300).contains(&raw.status) {
            serde_json::from_slice::<TokenPair>(&raw.body).map_err(|e| {
                let mut err = ApiError::from_response(raw.status, &raw.headers, &raw.body);
                err.message = format!("invalid refresh response: {}", e);
                err
            })
        } else {
            Err(ApiError::from_response(raw.status, &raw.headers, &raw.body))
        };

        if let Err(err) = &result {
            warn!(request_id = %request_id, status = err.status, "token refresh failed: {}", err.message);
        } else if self.debug {
            debug!(request_id = %request_id, "token refreshed");
        }
        result.map_err(|e| e.with_request_id(&request_id))
    }
}
