//! Prometheus metrics for turns, ethics annotations, and model failures.
//!
//! Each [`Metrics`] owns its own [`Registry`] so tests and multiple gateways
//! in one process never collide on metric names.

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::wellbeing::Decision;

pub struct Metrics {
    registry: Registry,
    turns: IntCounterVec,
    ethics_warnings: IntCounterVec,
    model_errors: IntCounter,
    active_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let turns = IntCounterVec::new(
            Opts::new("pda_turns_total", "Completed turns by wellbeing decision"),
            &["decision"],
        )?;
        let ethics_warnings = IntCounterVec::new(
            Opts::new(
                "pda_ethics_warnings_total",
                "Ethics annotations appended, by category",
            ),
            &["category"],
        )?;
        let model_errors = IntCounter::new(
            "pda_model_errors_total",
            "Model calls that failed or timed out",
        )?;
        let active_sessions = IntGauge::new("pda_active_sessions", "Live conversation sessions")?;

        registry.register(Box::new(turns.clone()))?;
        registry.register(Box::new(ethics_warnings.clone()))?;
        registry.register(Box::new(model_errors.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            registry,
            turns,
            ethics_warnings,
            model_errors,
            active_sessions,
        })
    }

    pub fn record_turn(&self, decision: Decision) {
        self.turns.with_label_values(&[decision.as_str()]).inc();
    }

    pub fn record_ethics(&self, categories: &[String]) {
        for category in categories {
            self.ethics_warnings
                .with_label_values(&[category.as_str()])
                .inc();
        }
    }

    pub fn record_model_error(&self) {
        self.model_errors.inc();
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .context("Failed to encode metrics")?;
        String::from_utf8(buf).context("Metrics output was not UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_render() {
        let metrics = Metrics::new().unwrap();
        metrics.record_turn(Decision::Allow);
        metrics.record_turn(Decision::Allow);
        metrics.record_turn(Decision::HardStop);
        metrics.record_ethics(&["crypto".to_string(), "gambling".to_string()]);
        metrics.record_model_error();
        metrics.set_active_sessions(3);

        let out = metrics.render().unwrap();
        assert!(out.contains(r#"pda_turns_total{decision="allow"} 2"#), "{out}");
        assert!(out.contains(r#"pda_turns_total{decision="hard_stop"} 1"#));
        assert!(out.contains(r#"pda_ethics_warnings_total{category="crypto"} 1"#));
        assert!(out.contains("pda_model_errors_total 1"));
        assert!(out.contains("pda_active_sessions 3"));
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_model_error();
        assert!(b.render().unwrap().contains("pda_model_errors_total 0"));
    }
}
