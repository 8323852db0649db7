use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::ClientConfig;
use crate::session::{SessionStore, UserProfile};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NoToken,

    #[error("Session changed while the token refresh was in flight")]
    SessionChanged,

    #[error("Authentication rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NoToken => "NO_TOKEN",
            AuthError::SessionChanged => "SESSION_CHANGED",
            AuthError::Rejected { .. } => "UNAUTHORIZED",
            AuthError::Http(_) => "HTTP_ERROR",
            AuthError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Token pair as issued by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "token", alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Login and token refresh against the backend's auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    login_url: String,
    refresh_url: String,
}

impl AuthClient {
    pub fn new(config: &ClientConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.api.timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            login_url: format!("{}{}", config.api.base_url, config.api.login_path),
            refresh_url: format!("{}{}", config.api.base_url, config.api.refresh_path),
        }
    }

    /// Authenticate and commit the returned session.
    pub async fn login(
        &self,
        store: &SessionStore,
        username: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, AuthError> {
        let response = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let tokens = read_tokens(response).await?;

        store.commit(tokens.access_token, tokens.refresh_token, tokens.user.clone())?;
        info!("Logged in as {}", username);
        Ok(tokens.user)
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// A login or logout that lands while the request is out wins; the new
    /// tokens are then dropped.
    pub async fn refresh(&self, store: &SessionStore) -> Result<(), AuthError> {
        let (session, generation) = store.snapshot();
        if !session.is_authenticated() {
            return Err(AuthError::NoToken);
        }
        let refresh_token = session.refresh_token.ok_or(AuthError::NoToken)?;

        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let tokens = read_tokens(response).await?;

        if !store.refresh_tokens(generation, tokens.access_token, tokens.refresh_token)? {
            return Err(AuthError::SessionChanged);
        }
        Ok(())
    }
}

async fn read_tokens(response: reqwest::Response) -> Result<TokenResponse, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(|m| m.as_str())
            .unwrap_or("request failed")
            .to_string();
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}
