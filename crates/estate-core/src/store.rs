//! Session store: `caller_id -> Session`, created lazily, evicted when idle.
//!
//! Each session sits behind its own async mutex. The engine holds that lock for
//! a whole pipeline step, so events for the same caller are serialized while
//! events for different callers only contend on a map shard for the lookup.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::session::Session;

/// Shared, lockable session.
pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session for `caller_id`, or a fresh one in `AwaitingFirstUtterance`.
    pub fn get_or_create(&self, caller_id: &str) -> SessionHandle {
        match self.sessions.entry(caller_id.to_string()) {
            Entry::Occupied(e) => Arc::clone(e.get()),
            Entry::Vacant(e) => {
                tracing::info!(caller = %caller_id, "new call session");
                let handle = Arc::new(Mutex::new(Session::new(caller_id)));
                e.insert(Arc::clone(&handle));
                handle
            }
        }
    }

    pub fn get(&self, caller_id: &str) -> Option<SessionHandle> {
        self.sessions.get(caller_id).map(|s| Arc::clone(s.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove sessions idle for longer than `max_idle`. Returns how many were removed.
    ///
    /// A session is kept while any handler holds a handle to it (locked or about
    /// to lock), so an in-flight step never writes to an evicted session.
    pub fn evict_idle(&self, max_idle: chrono::Duration) -> usize {
        let now = chrono::Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(session) => !session.is_idle(max_idle, now),
                Err(_) => true,
            }
        });
        before.saturating_sub(self.sessions.len())
    }
}
