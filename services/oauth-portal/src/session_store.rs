//! Server-side session storage keyed by cookie session id
//!
//! Each request loads a `SessionSnapshot`, lets `AuthSession` mutate it, and
//! commits it back. Identity rotation happens on the snapshot: the old id is
//! retired and only dropped from the store at commit time, so a failed
//! request never leaves the browser without a session.
//!
//! The store is an LRU cache bounded by `max_sessions`. Entries untouched for
//! `idle_timeout_secs` are swept from the cold end on every load and commit.
//!
//! A tokio Mutex serializes loads and commits. Two concurrent requests on the
//! same session id are last-commit-wins, except that a commit never brings
//! back a session another request has already ended.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use oauth_session::{SessionStorage, Slot};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::SessionConfig;

type Slots = HashMap<String, String>;

struct Entry {
    slots: Slots,
    touched: Instant,
}

/// In-memory session cache shared by all handlers.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<LruCache<String, Entry>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Arc::new(Mutex::new(LruCache::new(cap))),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }

    /// Load the session for `id`, or start a new one if the id is unknown.
    ///
    /// Unknown ids are never adopted: a client-chosen id always gets replaced
    /// by a server-issued one.
    pub async fn load(&self, id: Option<&str>) -> SessionSnapshot {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(id) {
                entry.touched = Instant::now();
                return SessionSnapshot {
                    id: id.to_owned(),
                    origin: Some(id.to_owned()),
                    retired: Vec::new(),
                    slots: entry.slots.clone(),
                };
            }
        }

        debug!("starting new session");
        SessionSnapshot::fresh()
    }

    /// Persist a snapshot and return the id the browser should hold.
    ///
    /// Retired ids are removed. Returns `None` when nothing was stored: the
    /// snapshot was empty, or the session it was loaded from has since been
    /// ended or evicted.
    pub async fn commit(&self, snapshot: SessionSnapshot) -> Option<String> {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);

        let SessionSnapshot {
            id,
            origin,
            retired,
            slots,
        } = snapshot;

        if let Some(origin) = &origin {
            if !sessions.contains(origin) {
                debug!("session ended while the request was in flight, discarding changes");
                return None;
            }
        }

        for old in &retired {
            sessions.pop(old);
        }
        if !retired.is_empty() {
            debug!(retired = retired.len(), "session id rotated");
        }

        if slots.is_empty() {
            sessions.pop(&id);
            return None;
        }

        if sessions.len() == sessions.cap().get() && !sessions.contains(&id) {
            debug!(
                max_sessions = sessions.cap().get(),
                "session store full, evicting least recently used"
            );
        }
        sessions.put(
            id.clone(),
            Entry {
                slots,
                touched: Instant::now(),
            },
        );
        Some(id)
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop idle entries from the cold end. Loads and commits both refresh
    /// `touched`, so LRU order is also idle order.
    fn evict_idle(&self, sessions: &mut LruCache<String, Entry>) {
        let mut expired = 0usize;
        loop {
            let idle = matches!(
                sessions.peek_lru(),
                Some((_, entry)) if entry.touched.elapsed() >= self.idle_timeout
            );
            if !idle {
                break;
            }
            sessions.pop_lru();
            expired += 1;
        }
        if expired > 0 {
            debug!(expired, "idle sessions evicted");
        }
    }
}

/// One request's view of a session.
#[derive(Debug)]
pub struct SessionSnapshot {
    id: String,
    /// Id the snapshot was loaded under; `None` for a new session.
    origin: Option<String>,
    retired: Vec<String>,
    slots: Slots,
}

impl SessionSnapshot {
    fn fresh() -> Self {
        Self {
            id: new_session_id(),
            origin: None,
            retired: Vec::new(),
            slots: Slots::new(),
        }
    }

    #[cfg(test)]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SessionStorage for SessionSnapshot {
    fn is_active(&self) -> bool {
        true
    }

    fn get(&self, slot: Slot) -> Option<&str> {
        self.slots.get(slot.as_str()).map(String::as_str)
    }

    fn set(&mut self, slot: Slot, value: String) {
        self.slots.insert(slot.as_str().to_owned(), value);
    }

    fn unset(&mut self, slot: Slot) {
        self.slots.remove(slot.as_str());
    }

    fn rotate_identity(&mut self) {
        let old = std::mem::replace(&mut self.id, new_session_id());
        self.retired.push(old);
    }
}

fn new_session_id() -> String {
    format!("sess_{}", uuid::Uuid::new_v4().as_simple())
}
