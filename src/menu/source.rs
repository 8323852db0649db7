use async_trait::async_trait;
use serde::Deserialize;

use super::{MenuError, MenuTree};
use crate::config::ClientConfig;

/// Where the permission tree comes from.
#[async_trait]
pub trait MenuSource: Send + Sync {
    async fn fetch_menu(&self, access_token: &str) -> Result<MenuTree, MenuError>;
}

/// A body without `menu` is a decode error, never an empty tree.
#[derive(Debug, Deserialize)]
struct MenuResponse {
    menu: MenuTree,
}

/// `GET {base_url}{menu.path}` with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpMenuSource {
    client: reqwest::Client,
    url: String,
}

impl HttpMenuSource {
    pub fn new(config: &ClientConfig) -> Result<Self, MenuError> {
        let client = reqwest::Client::builder()
            .timeout(config.api.timeout())
            .build()
            .map_err(|e| MenuError::FetchFailed(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            url: format!("{}{}", config.api.base_url, config.menu.path),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MenuSource for HttpMenuSource {
    async fn fetch_menu(&self, access_token: &str) -> Result<MenuTree, MenuError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| MenuError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MenuError::Status {
                status: status.as_u16(),
            });
        }

        let body: MenuResponse = response
            .json()
            .await
            .map_err(|e| MenuError::Decode(e.to_string()))?;
        Ok(body.menu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_requires_menu_field() {
        assert!(serde_json::from_str::<MenuResponse>(r#"{"detail":"x"}"#).is_err());
    }

    #[test]
    fn test_response_with_empty_menu_is_empty_tree() {
        let body: MenuResponse = serde_json::from_str(r#"{"menu":[]}"#).unwrap();
        assert!(body.menu.is_empty());
    }
}
