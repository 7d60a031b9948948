//! The temporal wellbeing guard: runs the rule chain against a session.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::Arc;

use super::decision::WellbeingDecision;
use super::policy::WellbeingPolicy;
use super::rules::{default_rules, WellbeingRule};
use super::state::SessionState;

/// Source of wall-clock time for the guard.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A manually driven clock, for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Evaluates a [`SessionState`] against a [`WellbeingPolicy`].
///
/// Rules are checked in order and the first match wins:
/// session duration, message count, night, meals, screen break.
pub struct TemporalWellbeingGuard {
    policy: WellbeingPolicy,
    rules: Vec<Box<dyn WellbeingRule>>,
    clock: Arc<dyn Clock>,
}

impl TemporalWellbeingGuard {
    pub fn new(policy: WellbeingPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: WellbeingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            rules: default_rules(),
            clock,
        }
    }

    /// Replace the rule chain. Order is priority.
    pub fn with_rules(mut self, rules: Vec<Box<dyn WellbeingRule>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn policy(&self) -> &WellbeingPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn evaluate(&self, state: &mut SessionState) -> WellbeingDecision {
        let now = self.clock.now();
        self.evaluate_at(state, now)
    }

    pub fn evaluate_at(&self, state: &mut SessionState, now: DateTime<Local>) -> WellbeingDecision {
        for rule in &self.rules {
            if let Some(decision) = rule.check(state, now, &self.policy) {
                tracing::debug!(
                    session_id = %state.session_id,
                    rule = rule.name(),
                    decision = %decision.decision,
                    "Wellbeing rule fired"
                );
                return decision;
            }
        }
        WellbeingDecision::allow()
    }
}

impl Default for TemporalWellbeingGuard {
    fn default() -> Self {
        Self::new(WellbeingPolicy::default())
    }
}
