//! Temporal wellbeing guard.
//!
//! A [`TemporalWellbeingGuard`] evaluates a conversation's [`SessionState`]
//! against a [`WellbeingPolicy`] and returns a [`WellbeingDecision`]. The
//! checks are an ordered list of [`WellbeingRule`]s where the first match
//! wins, so each rule can be tested in isolation.

pub mod decision;
pub mod guard;
pub mod policy;
pub mod rules;
pub mod state;

pub use decision::{Decision, WellbeingDecision};
pub use guard::{Clock, FixedClock, SystemClock, TemporalWellbeingGuard};
pub use policy::WellbeingPolicy;
pub use rules::{default_rules, WellbeingRule};
pub use state::SessionState;

use crate::config::WellbeingConfig;

/// Factory: build a guard on the system clock from the `[wellbeing]` section.
pub fn create_guard(config: &WellbeingConfig) -> anyhow::Result<TemporalWellbeingGuard> {
    Ok(TemporalWellbeingGuard::new(WellbeingPolicy::from_config(
        config,
    )?))
}
