//! Session management: one agent plus wellbeing state per conversation id.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{AgentFactory, Conversation, SessionHandle, SessionStore};

use std::sync::Arc;

use crate::config::SessionsConfig;

/// Create the default in-memory session store.
pub fn create_session_store(config: &SessionsConfig, factory: AgentFactory) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new(factory, config.max_sessions))
}
