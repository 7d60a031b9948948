//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{AgentFactory, Conversation, SessionHandle, SessionStore};
use crate::wellbeing::{Clock, SessionState, SystemClock};

struct Entry {
    handle: SessionHandle,
    last_active: DateTime<Local>,
}

impl Entry {
    /// Someone besides the store holds the handle, i.e. a turn is running.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.handle) > 1
    }
}

/// An in-memory session store backed by a mutex-protected hash map.
///
/// Bounded to `max_sessions`; creating one more evicts the least recently
/// used idle session. Sessions with a turn in flight are never evicted.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    factory: AgentFactory,
    clock: Arc<dyn Clock>,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new(factory: AgentFactory, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            clock: Arc::new(SystemClock),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Use `clock` for session start times and idle bookkeeping.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Evict the least recently used idle session. Returns `false` when
    /// every live session has a turn in flight.
    fn evict_lru(sessions: &mut HashMap<String, Entry>) -> bool {
        let victim = sessions
            .iter()
            .filter(|(_, e)| !e.in_use())
            .min_by_key(|(_, e)| e.last_active)
            .map(|(id, _)| id.clone());

        let Some(id) = victim else {
            return false;
        };
        sessions.remove(&id);
        tracing::debug!(session_id = %id, "Evicted least recently used session");
        true
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Result<SessionHandle> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_active = now;
            return Ok(entry.handle.clone());
        }

        // Busy sessions are never dropped; the map may overshoot until they finish
        while sessions.len() >= self.max_sessions {
            if !Self::evict_lru(&mut sessions) {
                tracing::warn!(
                    live = sessions.len(),
                    max = self.max_sessions,
                    "Session store over capacity: all sessions busy"
                );
                break;
            }
        }

        let conversation = Conversation {
            agent: (self.factory)(),
            state: SessionState::new(session_id, now),
        };
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(conversation));
        sessions.insert(
            session_id.to_string(),
            Entry {
                handle: handle.clone(),
                last_active: now,
            },
        );
        tracing::debug!(session_id, live = sessions.len(), "Session created");
        Ok(handle)
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionHandle>> {
        let sessions = self.sessions.lock();
        Ok(sessions.get(session_id).map(|e| e.handle.clone()))
    }

    async fn remove(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.lock();
        Ok(sessions.remove(session_id).is_some())
    }

    async fn evict_idle(&self, idle_for: Duration) -> Result<usize> {
        // Out of chrono's range: nothing can have been idle that long
        let Ok(idle_for) = chrono::Duration::from_std(idle_for) else {
            return Ok(0);
        };
        let cutoff = self.clock.now() - idle_for;

        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, e| e.last_active > cutoff || e.in_use());
        Ok(before - sessions.len())
    }

    fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
