use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{Session, UserProfile};
use crate::storage::{self, Entry, SnapshotStorage, StorageError};

/// Storage key holding the token pair and profile as one document.
pub const SESSION_KEY: &str = "session";

struct Current {
    session: Session,
    generation: u64,
}

/// Owner of the persisted session.
///
/// Every `commit` and `clear` bumps a generation counter. Consumers that
/// derive state from a session (the menu provider) compare generations to
/// tell a new login apart from the one they fetched for.
pub struct SessionStore {
    storage: Arc<dyn SnapshotStorage>,
    current: RwLock<Current>,
    generation_tx: watch::Sender<u64>,
}

impl SessionStore {
    /// Open the store and load whatever session was persisted.
    pub fn open(storage: Arc<dyn SnapshotStorage>) -> Self {
        let session = read_session(storage.as_ref());
        let (generation_tx, _) = watch::channel(0);

        Self {
            storage,
            current: RwLock::new(Current {
                session,
                generation: 0,
            }),
            generation_tx,
        }
    }

    /// Re-read the persisted snapshot.
    ///
    /// Never fails: an absent or corrupt snapshot yields an empty session.
    pub fn load(&self) -> Session {
        let session = read_session(self.storage.as_ref());
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.session != session {
            current.session = session.clone();
            current.generation += 1;
            self.publish(current.generation);
        }
        session
    }

    /// In-memory view of the session.
    pub fn session(&self) -> Session {
        self.read_current().session.clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.read_current().session.access_token.clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.read_current().session.profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_current().session.is_authenticated()
    }

    pub fn generation(&self) -> u64 {
        self.read_current().generation
    }

    /// Session and its generation, read together.
    pub fn snapshot(&self) -> (Session, u64) {
        let current = self.read_current();
        (current.session.clone(), current.generation)
    }

    /// Receiver that changes whenever a login or logout happens.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Persist a freshly authenticated session.
    pub fn commit(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        profile: Option<UserProfile>,
    ) -> Result<(), StorageError> {
        let session = Session {
            access_token: Some(access_token),
            refresh_token,
            profile,
        };

        // Hold the lock across the write so readers never see memory and
        // storage disagree
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        storage::write_json(self.storage.as_ref(), SESSION_KEY, &session)?;
        current.session = session;
        current.generation += 1;
        self.publish(current.generation);

        info!(
            "Session committed for user {}",
            current.session.user_id().unwrap_or("<unknown>")
        );
        Ok(())
    }

    /// Swap in a refreshed token pair for the same user.
    ///
    /// `generation` is the one read before the refresh request went out. If a
    /// login or logout happened since, nothing is written and `Ok(false)` is
    /// returned. The generation is left alone: the identity did not change.
    pub fn refresh_tokens(
        &self,
        generation: u64,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<bool, StorageError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.generation != generation || !current.session.is_authenticated() {
            debug!("Dropping refreshed tokens for stale session generation {}", generation);
            return Ok(false);
        }

        let mut session = current.session.clone();
        session.access_token = Some(access_token);
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }

        storage::write_json(self.storage.as_ref(), SESSION_KEY, &session)?;
        current.session = session;
        debug!("Session tokens refreshed");
        Ok(true)
    }

    /// Drop the whole session.
    ///
    /// Memory is cleared even if removing the persisted entry fails, so the
    /// UI gate closes regardless.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.session = Session::default();
        current.generation += 1;
        self.publish(current.generation);
        info!("Session cleared");

        self.storage.remove(SESSION_KEY)
    }

    pub(crate) fn storage(&self) -> &dyn SnapshotStorage {
        self.storage.as_ref()
    }

    fn read_current(&self) -> std::sync::RwLockReadGuard<'_, Current> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, generation: u64) {
        self.generation_tx.send_replace(generation);
    }
}

fn read_session(storage: &dyn SnapshotStorage) -> Session {
    match storage::read_json::<Session>(storage, SESSION_KEY) {
        Ok(Entry::Present(session)) => session,
        Ok(Entry::Absent) | Ok(Entry::Discarded) => Session::default(),
        Err(e) => {
            tracing::warn!("Session snapshot unreadable, starting empty: {}", e);
            Session::default()
        }
    }
}
