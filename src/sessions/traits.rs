//! Session storage traits and types for per-conversation state.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::Agent;
use crate::wellbeing::SessionState;

/// Everything one conversation owns: the agent's history and the guard's
/// temporal record.
pub struct Conversation {
    pub agent: Agent,
    pub state: SessionState,
}

/// Shared handle to a conversation. Holding the lock serializes turns for
/// that session while other sessions proceed.
pub type SessionHandle = Arc<tokio::sync::Mutex<Conversation>>;

/// Builds a fresh agent for a newly created session.
pub type AgentFactory = Arc<dyn Fn() -> Agent + Send + Sync>;

/// Keyed store of live conversations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the session, creating it on first use. Never fails for unknown ids.
    async fn get_or_create(&self, session_id: &str) -> Result<SessionHandle>;

    /// Get an existing session, if it exists.
    async fn get(&self, session_id: &str) -> Result<Option<SessionHandle>>;

    /// Drop a session. Returns whether it existed.
    async fn remove(&self, session_id: &str) -> Result<bool>;

    /// Drop sessions with no activity for at least `idle_for`. Sessions with a
    /// turn in flight are kept. Returns how many were dropped.
    async fn evict_idle(&self, idle_for: Duration) -> Result<usize>;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
