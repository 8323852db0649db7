use std::sync::Arc;

use crate::auth::{AuthClient, AuthError};
use crate::config::ClientConfig;
use crate::menu::{HttpMenuSource, MenuError, MenuProvider, MenuSource};
use crate::session::SessionStore;
use crate::storage::{FileStorage, SnapshotStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Auth client error: {0}")]
    Auth(#[from] AuthError),
    #[error("Menu client error: {0}")]
    Menu(#[from] MenuError),
}

/// Session store, menu provider and auth client wired from one config.
///
/// Consumers get the pieces by reference; nothing here is global.
pub struct PortalService {
    pub session: Arc<SessionStore>,
    pub menu: Arc<MenuProvider>,
    pub auth: AuthClient,
}

impl PortalService {
    /// File-backed storage under `config.storage.dir`, HTTP sources from `config.api`.
    pub fn open(config: &ClientConfig) -> Result<Self, PortalError> {
        let storage = Arc::new(FileStorage::open(&config.storage.dir)?);
        let source = Arc::new(HttpMenuSource::new(config)?);
        let auth = AuthClient::new(config)?;
        Ok(Self::with_parts(config, storage, source, auth))
    }

    pub fn with_parts(
        config: &ClientConfig,
        storage: Arc<dyn SnapshotStorage>,
        source: Arc<dyn MenuSource>,
        auth: AuthClient,
    ) -> Self {
        let session = Arc::new(SessionStore::open(storage));
        let menu = Arc::new(MenuProvider::new(session.clone(), source, config));
        Self {
            session,
            menu,
            auth,
        }
    }

    /// Log in and load the menu for the new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.auth.login(&self.session, username, password).await?;
        self.menu.sync().await;
        Ok(())
    }

    pub fn logout(&self) -> Result<(), StorageError> {
        self.menu.logout()
    }

    /// Capability check against the current session.
    pub fn has_access(&self, key: &str) -> bool {
        self.menu.has_access(key)
    }
}
