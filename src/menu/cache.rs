//! Last-known-good menu trees, one entry per user.
//!
//! Entries are keyed on a hash of the user id so a tree cached for one user
//! can never serve as the fallback for another user on the same machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::MenuTree;
use crate::storage::{self, Entry, SnapshotStorage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMenu {
    pub user_id: String,
    pub fetched_at: DateTime<Utc>,
    pub menu: MenuTree,
}

/// Storage key for a user's cached tree.
pub fn cache_key(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    // First 16 hex characters keep file names short
    format!("menu-{}", &hash[..16])
}

pub fn load(storage: &dyn SnapshotStorage, user_id: &str) -> Option<CachedMenu> {
    match storage::read_json::<CachedMenu>(storage, &cache_key(user_id)) {
        // Guard against a hash prefix collision
        Ok(Entry::Present(cached)) if cached.user_id == user_id => Some(cached),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Menu cache unreadable: {}", e);
            None
        }
    }
}

pub fn store(
    storage: &dyn SnapshotStorage,
    user_id: &str,
    menu: &MenuTree,
    fetched_at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let cached = CachedMenu {
        user_id: user_id.to_string(),
        fetched_at,
        menu: menu.clone(),
    };
    storage::write_json(storage, &cache_key(user_id), &cached)
}
