//! Authentication operations.
//!
//! Login stores the returned token pair on the client, so every later request
//! is sent with the new bearer token and 401s can be recovered by refresh.

use crate::client::Client;
use crate::credentials::RefreshOutcome;
use crate::error::{ApiError, Result};
use crate::transport::Request;
use crate::types::{LoginRequest, TokenPair};
use reqwest::Method;
use serde_json::Value;

/// Client for authentication operations.
///
/// Access via `client.auth()`.
pub struct AuthClient {
    client: Client,
}

impl AuthClient {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Log in with email and password.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use signvault::{Client, types::LoginRequest};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = Client::new("https://api.signvault.io/v1", "sv_live_xxxxx")?;
    ///     let tokens = client.auth().login(LoginRequest {
    ///         email: "ops@example.com".to_string(),
    ///         password: "hunter2".to_string(),
    ///     }).await?;
    ///     println!("Token expires in {:?}s", tokens.expires_in);
    ///     Ok(())
    /// }
    /// ```
    pub async fn login(&self, request: LoginRequest) -> Result<TokenPair> {
        let request = Request::new(Method::POST, "/auth/login")
            .json(&request)?
            .skip_refresh();
        let tokens: TokenPair = self.client.send(request).await?.data;
        self.client
            .set_tokens(tokens.access_token.clone(), tokens.refresh_token.clone());
        Ok(tokens)
    }

    /// Refresh the access token now, or join a refresh already in flight.
    ///
    /// Returns the new access token. Fails with a 401 when no refresh token
    /// is known.
    pub async fn refresh(&self) -> Result<String> {
        let transport = &self.client.transport;
        match transport
            .credentials
            .refresh_with(|token| transport.refresh_tokens(token))
            .await
        {
            RefreshOutcome::Refreshed(token) => Ok(token),
            RefreshOutcome::NoRefreshToken => Err(ApiError {
                message: "no refresh token available".to_string(),
                status: 401,
                status_text: "Unauthorized".to_string(),
                code: Some("missing_refresh_token".to_string()),
                validation_errors: Vec::new(),
                rate_limit: None,
                retry_after: None,
                request_id: None,
            }
            .into()),
            RefreshOutcome::Failed(err) => Err(err.into()),
        }
    }

    /// Log out. Local tokens and cached responses are dropped even if the
    /// server call fails.
    pub async fn logout(&self) -> Result<()> {
        let request = Request::new(Method::POST, "/auth/logout").skip_refresh();
        let result = self.client.send::<Value>(request).await;
        self.client.clear_tokens();
        self.client.clear_cache();
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_without_token() {
        let client = Client::new("https://api.signvault.io/v1", "sv_test").unwrap();
        let err = client.auth().refresh().await.unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(
            err.api().and_then(|e| e.code.as_deref()),
            Some("missing_refresh_token")
        );
    }
}
