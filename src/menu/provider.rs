//! Menu/authorization provider.
//!
//! Holds the permission tree for the current session and answers
//! `has_access` queries against it. State moves through
//! `Idle -> Loading -> Ready | Errored`, and back to `Idle` on logout.
//!
//! CONCURRENCY
//! ===========
//! At most one fetch runs at a time. A refresh requested while one is in
//! flight is queued and run once the current fetch finishes. Results are
//! applied only if the session generation they were fetched for is still
//! current, so a slow response can never land on a different user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{cache, MenuError, MenuSource, MenuTree};
use crate::config::ClientConfig;
use crate::session::SessionStore;
use crate::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    Idle,
    Loading,
    Ready,
    Errored,
}

/// Consistent view of the provider; replaced wholesale on every transition.
#[derive(Debug, Clone)]
pub struct MenuSnapshot {
    pub state: ProviderState,
    pub tree: MenuTree,
    pub error: Option<MenuError>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Tree came from the cache after a failed fetch.
    pub degraded: bool,
    /// Session generation this snapshot was built for.
    pub generation: Option<u64>,
}

impl MenuSnapshot {
    fn idle() -> Self {
        Self {
            state: ProviderState::Idle,
            tree: MenuTree::default(),
            error: None,
            fetched_at: None,
            degraded: false,
            generation: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == ProviderState::Loading
    }
}

pub struct MenuProvider {
    session: Arc<SessionStore>,
    source: Arc<dyn MenuSource>,
    max_depth: usize,
    enable_cache: bool,
    snapshot: RwLock<Arc<MenuSnapshot>>,
    fetch_gate: tokio::sync::Mutex<()>,
    rerun: AtomicBool,
}

impl MenuProvider {
    pub fn new(
        session: Arc<SessionStore>,
        source: Arc<dyn MenuSource>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            session,
            source,
            max_depth: config.menu.max_depth,
            enable_cache: config.menu.enable_cache,
            snapshot: RwLock::new(Arc::new(MenuSnapshot::idle())),
            fetch_gate: tokio::sync::Mutex::new(()),
            rerun: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn snapshot(&self) -> Arc<MenuSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ProviderState {
        self.snapshot().state
    }

    pub fn tree(&self) -> MenuTree {
        self.snapshot().tree.clone()
    }

    pub fn error(&self) -> Option<MenuError> {
        self.snapshot().error.clone()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().fetched_at
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot().is_loading()
    }

    pub fn is_degraded(&self) -> bool {
        self.snapshot().degraded
    }

    /// Whether the current user may see the affordance gated by `key`.
    ///
    /// Read-only: never triggers a fetch.
    pub fn has_access(&self, key: &str) -> bool {
        let (session, generation) = self.session.snapshot();
        if !session.is_authenticated() {
            return false;
        }
        if session.role().is_elevated() {
            return true;
        }

        // A tree built for another session grants nothing
        let snapshot = self.snapshot();
        if snapshot.generation != Some(generation) {
            return false;
        }
        snapshot.tree.find(key, self.max_depth).is_some()
    }

    /// Bring the provider in line with the session.
    ///
    /// No token resets to `Idle`. A token the provider has not fetched for
    /// yet starts a fetch. Otherwise nothing happens.
    pub async fn sync(&self) {
        let (session, generation) = self.session.snapshot();
        if !session.is_authenticated() {
            if self.state() != ProviderState::Idle {
                self.reset();
            }
            return;
        }

        let current = self.snapshot();
        if current.generation == Some(generation) && current.state != ProviderState::Idle {
            return;
        }
        self.refresh().await;
    }

    /// Refetch the tree now, or queue a refetch if one is in flight.
    pub async fn refresh(&self) {
        self.rerun.store(true, Ordering::SeqCst);
        loop {
            let Ok(guard) = self.fetch_gate.try_lock() else {
                debug!("Menu fetch in flight; refresh queued");
                return;
            };
            while self.rerun.swap(false, Ordering::SeqCst) {
                self.fetch_once().await;
            }
            drop(guard);

            // A request may have arrived between the last swap and the unlock
            if !self.rerun.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    /// Clear the session and return to `Idle`.
    pub fn logout(&self) -> Result<(), StorageError> {
        let result = self.session.clear();
        self.reset();
        info!("Logged out; menu provider reset");
        result
    }

    /// Drop the tree, error and loading flag.
    pub fn reset(&self) {
        self.replace(MenuSnapshot::idle());
    }

    /// Follow session changes in the background.
    ///
    /// The task runs until aborted through the returned handle.
    pub fn watch_session(self: Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.session.subscribe();
        tokio::spawn(async move {
            self.sync().await;
            while changes.changed().await.is_ok() {
                self.sync().await;
            }
        })
    }

    async fn fetch_once(&self) {
        let (session, generation) = self.session.snapshot();
        let Some(token) = session.access_token.clone() else {
            self.reset();
            return;
        };

        if !self.begin_loading(generation) {
            // Session moved on before the fetch started; go again with the new one
            self.rerun.store(true, Ordering::SeqCst);
            return;
        }

        let result = self.source.fetch_menu(&token).await;

        let next = match result {
            Ok(tree) => {
                let fetched_at = Utc::now();
                if let Some(user_id) = session.user_id().filter(|_| self.enable_cache) {
                    if let Err(e) = cache::store(self.session.storage(), user_id, &tree, fetched_at) {
                        warn!("Failed to cache menu: {}", e);
                    }
                }
                info!("Menu loaded ({} keys)", tree.keys().len());
                MenuSnapshot {
                    state: ProviderState::Ready,
                    tree,
                    error: None,
                    fetched_at: Some(fetched_at),
                    degraded: false,
                    generation: Some(generation),
                }
            }
            Err(error) => {
                let cached = session
                    .user_id()
                    .filter(|_| self.enable_cache)
                    .and_then(|user_id| cache::load(self.session.storage(), user_id));

                match cached {
                    Some(cached) => {
                        warn!("Menu fetch failed, using cached tree: {}", error);
                        MenuSnapshot {
                            state: ProviderState::Ready,
                            tree: cached.menu,
                            error: Some(error),
                            fetched_at: Some(cached.fetched_at),
                            degraded: true,
                            generation: Some(generation),
                        }
                    }
                    None => {
                        warn!("Menu fetch failed with no cached tree: {}", error);
                        MenuSnapshot {
                            state: ProviderState::Errored,
                            tree: MenuTree::default(),
                            error: Some(error),
                            fetched_at: None,
                            degraded: false,
                            generation: Some(generation),
                        }
                    }
                }
            }
        };

        self.apply(next, generation);
    }

    /// Enter `Loading` for `generation`, unless a login or logout already
    /// replaced it.
    fn begin_loading(&self, generation: u64) -> bool {
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.session.generation() != generation {
            debug!("Not starting menu fetch for stale session generation {}", generation);
            return false;
        }

        let same_session = slot.generation == Some(generation);
        let loading = MenuSnapshot {
            state: ProviderState::Loading,
            tree: if same_session {
                slot.tree.clone()
            } else {
                MenuTree::default()
            },
            error: None,
            fetched_at: if same_session { slot.fetched_at } else { None },
            degraded: false,
            generation: Some(generation),
        };
        *slot = Arc::new(loading);
        true
    }

    /// Install `next` only if the session is still the one it was fetched for.
    fn apply(&self, next: MenuSnapshot, generation: u64) {
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.session.generation() != generation {
            debug!("Discarding menu result for stale session generation {}", generation);
            return;
        }
        *slot = Arc::new(next);
    }

    fn replace(&self, next: MenuSnapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }
}
