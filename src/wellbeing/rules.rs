//! Ordered predicate → outcome rules evaluated by the guard.

use chrono::{DateTime, Duration, Local};

use super::decision::WellbeingDecision;
use super::policy::WellbeingPolicy;
use super::state::SessionState;

pub const SESSION_DURATION_MESSAGE: &str = "We praten al ongeveer vier uur met elkaar. \
Voor je gezondheid is het beter om nu echt te stoppen, \
even van het scherm weg te gaan en later verder te gaan.";

pub const MESSAGE_COUNT_MESSAGE: &str = "Deze sessie heeft al veel berichten gehad. \
Laten we hier een natuurlijke stop maken zodat je brein en ogen kunnen uitrusten.";

pub const NIGHT_MESSAGE: &str = "Het is nu laat. Je slaapritme is belangrijker dan nog een paar berichten. \
Mogelijk is dit een goed moment om af te ronden en naar bed te gaan.";

pub const SCREEN_BREAK_MESSAGE: &str = "We zijn al een tijd bezig. Kijk eens 20 seconden in de verte \
en focus op iets op afstand voordat we verder gaan.";

pub fn meal_message(meal: &str) -> String {
    format!(
        "We zitten rond {meal}. \
         Gezond eten en even weg van het scherm zijn belangrijk. \
         Wil je eerst iets eten en daarna eventueel verder praten?"
    )
}

/// A single wellbeing check. Rules run in order; the first `Some` wins.
pub trait WellbeingRule: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// Return a decision when this rule fires. Only the screen-break rule
    /// writes to `state`.
    fn check(
        &self,
        state: &mut SessionState,
        now: DateTime<Local>,
        policy: &WellbeingPolicy,
    ) -> Option<WellbeingDecision>;
}

/// Hard stop once the session has lasted `max_session_minutes`.
pub struct SessionDurationRule;

impl WellbeingRule for SessionDurationRule {
    fn name(&self) -> &'static str {
        "session_duration"
    }

    fn check(
        &self,
        state: &mut SessionState,
        now: DateTime<Local>,
        policy: &WellbeingPolicy,
    ) -> Option<WellbeingDecision> {
        let limit = Duration::minutes(i64::from(policy.max_session_minutes));
        (state.elapsed(now) >= limit).then(|| WellbeingDecision::hard_stop(SESSION_DURATION_MESSAGE))
    }
}

/// Hard stop once the message budget is used up.
pub struct MessageCountRule;

impl WellbeingRule for MessageCountRule {
    fn name(&self) -> &'static str {
        "message_count"
    }

    fn check(
        &self,
        state: &mut SessionState,
        _now: DateTime<Local>,
        policy: &WellbeingPolicy,
    ) -> Option<WellbeingDecision> {
        (state.messages_count >= policy.max_messages_per_session)
            .then(|| WellbeingDecision::hard_stop(MESSAGE_COUNT_MESSAGE))
    }
}

pub struct NightRule;

impl WellbeingRule for NightRule {
    fn name(&self) -> &'static str {
        "night"
    }

    fn check(
        &self,
        _state: &mut SessionState,
        now: DateTime<Local>,
        policy: &WellbeingPolicy,
    ) -> Option<WellbeingDecision> {
        (policy.enforce_night_limit && policy.is_night(now.time()))
            .then(|| WellbeingDecision::soft_stop(NIGHT_MESSAGE))
    }
}

/// Soft stop within `meal_window_minutes` of a meal, on the same calendar day.
pub struct MealRule;

impl MealRule {
    pub fn near_meal(now: DateTime<Local>, policy: &WellbeingPolicy) -> Option<&'static str> {
        let window = Duration::minutes(i64::from(policy.meal_window_minutes));
        let local = now.naive_local();
        policy.meals().into_iter().find_map(|(label, time)| {
            let meal_at = local.date().and_time(time);
            let distance = if local >= meal_at {
                local - meal_at
            } else {
                meal_at - local
            };
            (distance <= window).then_some(label)
        })
    }
}

impl WellbeingRule for MealRule {
    fn name(&self) -> &'static str {
        "meal"
    }

    fn check(
        &self,
        _state: &mut SessionState,
        now: DateTime<Local>,
        policy: &WellbeingPolicy,
    ) -> Option<WellbeingDecision> {
        Self::near_meal(now, policy).map(|meal| WellbeingDecision::soft_stop(meal_message(meal)))
    }
}

/// Suggests an eye break every `break_interval_minutes` and stamps the suggestion.
pub struct ScreenBreakRule;

impl WellbeingRule for ScreenBreakRule {
    fn name(&self) -> &'static str {
        "screen_break"
    }

    fn check(
        &self,
        state: &mut SessionState,
        now: DateTime<Local>,
        policy: &WellbeingPolicy,
    ) -> Option<WellbeingDecision> {
        let interval = Duration::minutes(i64::from(policy.break_interval_minutes));
        if now - state.break_reference() < interval {
            return None;
        }
        state.last_break_suggested_at = Some(now);
        Some(WellbeingDecision::soft_stop(SCREEN_BREAK_MESSAGE))
    }
}

/// The built-in rule chain in priority order.
pub fn default_rules() -> Vec<Box<dyn WellbeingRule>> {
    vec![
        Box::new(SessionDurationRule),
        Box::new(MessageCountRule),
        Box::new(NightRule),
        Box::new(MealRule),
        Box::new(ScreenBreakRule),
    ]
}
