//! Credential state and token refresh coordination.
//!
//! Only one refresh may be in flight per client. Callers that hit a 401 while
//! a refresh is running wait in a FIFO queue and are released, in arrival
//! order, with the refresh outcome once it settles.

use crate::error::ApiError;
use crate::types::TokenPair;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::oneshot;

type Waiter = oneshot::Sender<Result<String, ApiError>>;

/// How outbound requests authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `X-API-Key: <key>`.
    ApiKey(String),
}

/// Result of asking the store to refresh the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new access token is stored and returned.
    Refreshed(String),
    /// No refresh token is known, so nothing was attempted.
    NoRefreshToken,
    /// The refresh call failed. The refresh token has been cleared.
    Failed(ApiError),
}

#[derive(Default)]
struct CredentialState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    api_key: Option<String>,
    refreshing: bool,
    pending: VecDeque<Waiter>,
}

enum Role {
    Leader(String),
    Waiter(oneshot::Receiver<Result<String, ApiError>>),
    Unavailable,
}

/// Process-wide credentials of one client.
#[derive(Default)]
pub struct CredentialStore {
    state: Mutex<CredentialState>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CredentialStore")
            .field("has_access_token", &state.access_token.is_some())
            .field("has_refresh_token", &state.refresh_token.is_some())
            .field("has_api_key", &state.api_key.is_some())
            .field("refreshing", &state.refreshing)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl CredentialStore {
    /// Create a store from the configured credentials.
    pub fn new(
        access_token: Option<String>,
        refresh_token: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            state: Mutex::new(CredentialState {
                access_token,
                refresh_token,
                api_key,
                ..Default::default()
            }),
        }
    }

    /// The scheme for the next request. A bearer token wins over an API key.
    pub fn auth_scheme(&self) -> Option<AuthScheme> {
        let state = self.state.lock();
        state
            .access_token
            .clone()
            .map(AuthScheme::Bearer)
            .or_else(|| state.api_key.clone().map(AuthScheme::ApiKey))
    }

    /// Current access token.
    pub fn access_token(&self) -> Option<String> {
        self.state.lock().access_token.clone()
    }

    /// Current refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.state.lock().refresh_token.clone()
    }

    /// Store a token pair, e.g. after login.
    pub fn set_tokens(&self, access_token: String, refresh_token: Option<String>) {
        let mut state = self.state.lock();
        state.access_token = Some(access_token);
        if refresh_token.is_some() {
            state.refresh_token = refresh_token;
        }
    }

    /// Forget the access and refresh tokens. An API key, if any, stays.
    pub fn clear_tokens(&self) {
        let mut state = self.state.lock();
        state.access_token = None;
        state.refresh_token = None;
    }

    /// Whether a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Callers queued behind the in-flight refresh.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Refresh the access token, or join the refresh already in flight.
    ///
    /// `refresh` is only invoked when this caller becomes the leader. It
    /// receives the stored refresh token.
    pub async fn refresh_with<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenPair, ApiError>>,
    {
        let role = {
            let mut state = self.state.lock();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(tx);
                Role::Waiter(rx)
            } else if let Some(token) = state.refresh_token.clone() {
                state.refreshing = true;
                Role::Leader(token)
            } else {
                Role::Unavailable
            }
        };

        match role {
            Role::Unavailable => RefreshOutcome::NoRefreshToken,
            Role::Waiter(rx) => match rx.await {
                Ok(Ok(token)) => RefreshOutcome::Refreshed(token),
                Ok(Err(err)) => RefreshOutcome::Failed(err),
                Err(_) => RefreshOutcome::Failed(abandoned()),
            },
            Role::Leader(token) => {
                let guard = RefreshGuard {
                    store: self,
                    settled: false,
                };
                let result = refresh(token).await;
                guard.settle(result)
            }
        }
    }

    fn finish(&self, result: Result<TokenPair, ApiError>) -> RefreshOutcome {
        let waiters: Vec<Waiter> = {
            let mut state = self.state.lock();
            state.refreshing = false;
            match &result {
                Ok(pair) => {
                    state.access_token = Some(pair.access_token.clone());
                    if let Some(refresh) = &pair.refresh_token {
                        state.refresh_token = Some(refresh.clone());
                    }
                }
                Err(_) => state.refresh_token = None,
            }
            state.pending.drain(..).collect()
        };

        let shared = result.map(|pair| pair.access_token);
        for waiter in waiters {
            let _ = waiter.send(shared.clone());
        }
        match shared {
            Ok(token) => RefreshOutcome::Refreshed(token),
            Err(err) => RefreshOutcome::Failed(err),
        }
    }
}

fn abandoned() -> ApiError {
    ApiError::network("ECONNABORTED", "token refresh was abandoned")
}

// Releases the queue even if the leading future is dropped mid-refresh.
struct RefreshGuard<'a> {
    store: &'a CredentialStore,
    settled: bool,
}

impl RefreshGuard<'_> {
    fn settle(mut self, result: Result<TokenPair, ApiError>) -> RefreshOutcome {
        self.settled = true;
        self.store.finish(result)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let waiters: Vec<Waiter> = {
            let mut state = self.store.state.lock();
            state.refreshing = false;
            state.pending.drain(..).collect()
        };
        for waiter in waiters {
            let _ = waiter.send(Err(abandoned()));
        }
    }
}
