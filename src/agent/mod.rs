#[allow(clippy::module_inception)]
pub mod agent;
pub mod loop_;

pub use agent::{Agent, AgentSettings, COERCION_PREFIX, COERCION_TRIGGER, DEFAULT_SYSTEM_PROMPT};
pub use loop_::{run, run_interactive};
