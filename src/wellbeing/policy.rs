//! Static wellbeing thresholds.

use anyhow::{Context, Result};
use chrono::NaiveTime;

use crate::config::WellbeingConfig;

/// Immutable thresholds consulted by [`super::TemporalWellbeingGuard`].
///
/// The night window may wrap midnight (`night_start > night_end`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellbeingPolicy {
    pub max_session_minutes: u32,
    pub max_messages_per_session: u32,
    pub enforce_night_limit: bool,
    pub night_start: NaiveTime,
    pub night_end: NaiveTime,
    pub breakfast_time: NaiveTime,
    pub lunch_time: NaiveTime,
    pub dinner_time: NaiveTime,
    pub meal_window_minutes: u32,
    pub break_interval_minutes: u32,
}

impl Default for WellbeingPolicy {
    fn default() -> Self {
        Self {
            max_session_minutes: 240,
            max_messages_per_session: 200,
            enforce_night_limit: true,
            night_start: hm(23, 0),
            night_end: hm(7, 0),
            breakfast_time: hm(8, 0),
            lunch_time: hm(12, 30),
            dinner_time: hm(18, 30),
            meal_window_minutes: 20,
            break_interval_minutes: 45,
        }
    }
}

impl WellbeingPolicy {
    /// Build a policy from the `[wellbeing]` config section.
    pub fn from_config(config: &WellbeingConfig) -> Result<Self> {
        let policy = Self {
            max_session_minutes: config.max_session_minutes,
            max_messages_per_session: config.max_messages_per_session,
            enforce_night_limit: config.enforce_night_limit,
            night_start: parse_clock_time("wellbeing.night_start", &config.night_start)?,
            night_end: parse_clock_time("wellbeing.night_end", &config.night_end)?,
            breakfast_time: parse_clock_time("wellbeing.breakfast_time", &config.breakfast_time)?,
            lunch_time: parse_clock_time("wellbeing.lunch_time", &config.lunch_time)?,
            dinner_time: parse_clock_time("wellbeing.dinner_time", &config.dinner_time)?,
            meal_window_minutes: config.meal_window_minutes,
            break_interval_minutes: config.break_interval_minutes,
        };

        if policy.max_session_minutes == 0 {
            anyhow::bail!("wellbeing.max_session_minutes must be greater than 0");
        }
        if policy.max_messages_per_session == 0 {
            anyhow::bail!("wellbeing.max_messages_per_session must be greater than 0");
        }
        if policy.break_interval_minutes == 0 {
            anyhow::bail!("wellbeing.break_interval_minutes must be greater than 0");
        }

        Ok(policy)
    }

    /// Whether `time` falls inside the night window. Start is inclusive,
    /// end exclusive. When start and end coincide the whole day counts as night.
    pub fn is_night(&self, time: NaiveTime) -> bool {
        let (start, end) = (self.night_start, self.night_end);
        if start < end {
            start <= time && time < end
        } else {
            time >= start || time < end
        }
    }

    /// Meals in the order they are checked, paired with their user-facing label.
    pub fn meals(&self) -> [(&'static str, NaiveTime); 3] {
        [
            ("ontbijt", self.breakfast_time),
            ("lunch", self.lunch_time),
            ("avondeten", self.dinner_time),
        ]
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_clock_time(field: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("{field} must be an HH:MM time, got {raw:?}"))
}
