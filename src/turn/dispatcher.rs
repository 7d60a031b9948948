use serde::Serialize;
use std::sync::Arc;

use crate::error::{self, PdaError};
use crate::ethics::EthicsFilter;
use crate::observability::Metrics;
use crate::sessions::SessionStore;
use crate::wellbeing::{Decision, TemporalWellbeingGuard, WellbeingDecision};

/// Result of one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    /// Text shown to the user: wellbeing message and/or model answer, plus
    /// any ethics annotations.
    pub reply: String,
    pub decision: WellbeingDecision,
    /// Ethics categories appended to this reply, in rule order.
    pub ethics_categories: Vec<String>,
}

/// Runs a user turn through guard, agent, and ethics filter.
///
/// Front ends (CLI loop, HTTP gateway) only ever talk to this type, so both
/// enforce the same wellbeing limits.
pub struct TurnDispatcher {
    sessions: Arc<dyn SessionStore>,
    guard: TemporalWellbeingGuard,
    ethics: EthicsFilter,
    metrics: Arc<Metrics>,
}

impl TurnDispatcher {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        guard: TemporalWellbeingGuard,
        ethics: EthicsFilter,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sessions,
            guard,
            ethics,
            metrics,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn handle(&self, session_id: &str, input: &str) -> error::Result<TurnOutcome> {
        let handle = self.sessions.get_or_create(session_id).await?;
        self.metrics.set_active_sessions(self.sessions.len());

        // Held across the model call: one turn at a time per session
        let mut conversation = handle.lock().await;

        let now = self.guard.now();
        conversation.state.record_message(now);
        let decision = self.guard.evaluate_at(&mut conversation.state, now);

        let answer = match decision.decision {
            Decision::HardStop => String::new(),
            Decision::SoftStop | Decision::Allow => {
                match conversation.agent.step(input).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        if matches!(e, PdaError::ModelUnavailable(_)) {
                            self.metrics.record_model_error();
                        }
                        tracing::warn!(session_id, error = %e, "Turn failed");
                        return Err(e);
                    }
                }
            }
        };
        drop(conversation);

        // Annotate the answer only, so wellbeing wording never trips a keyword
        let report = self.ethics.apply_with_report(&answer, input);
        let reply = match (&decision.decision, decision.message.as_deref()) {
            (Decision::HardStop, Some(message)) => format!("{message}{}", report.text),
            (Decision::SoftStop, Some(message)) => format!("{message}\n\n{}", report.text),
            _ => report.text,
        };

        self.metrics.record_turn(decision.decision);
        self.metrics.record_ethics(&report.categories);
        tracing::info!(
            session_id,
            decision = %decision.decision,
            ethics = ?report.categories,
            "Turn completed"
        );

        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            reply,
            decision,
            ethics_categories: report.categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentSettings};
    use crate::ethics::{builtin_rules, EthicsRule};
    use crate::providers::mock::{FailingProvider, ScriptedProvider};
    use crate::providers::Provider;
    use crate::sessions::{AgentFactory, InMemorySessionStore};
    use crate::wellbeing::rules::{
        meal_message, MESSAGE_COUNT_MESSAGE, NIGHT_MESSAGE, SESSION_DURATION_MESSAGE,
    };
    use crate::wellbeing::{FixedClock, WellbeingPolicy};
    use chrono::{DateTime, Local, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    struct Harness {
        dispatcher: TurnDispatcher,
        clock: Arc<FixedClock>,
        provider: Arc<ScriptedProvider>,
    }

    fn factory(provider: Arc<dyn Provider>) -> AgentFactory {
        let settings = Arc::new(AgentSettings::default());
        Arc::new(move || Agent::new(provider.clone(), settings.clone()))
    }

    fn build(
        provider: Arc<dyn Provider>,
        policy: WellbeingPolicy,
        start: DateTime<Local>,
    ) -> (TurnDispatcher, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(start));
        let store = InMemorySessionStore::new(factory(provider), 100).with_clock(clock.clone());
        let guard = TemporalWellbeingGuard::with_clock(policy, clock.clone());
        let rules: Vec<Box<dyn EthicsRule>> = builtin_rules()
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn EthicsRule>)
            .collect();
        let dispatcher = TurnDispatcher::new(
            Arc::new(store),
            guard,
            EthicsFilter::new(rules),
            Arc::new(Metrics::new().unwrap()),
        );
        (dispatcher, clock)
    }

    fn harness_with(policy: WellbeingPolicy, start: DateTime<Local>) -> Harness {
        let provider = Arc::new(ScriptedProvider::new());
        let (dispatcher, clock) = build(provider.clone(), policy, start);
        Harness {
            dispatcher,
            clock,
            provider,
        }
    }

    /// 10:00 on a weekday is outside night and meal windows.
    fn harness() -> Harness {
        harness_with(WellbeingPolicy::default(), at(10, 0))
    }

    #[tokio::test]
    async fn allow_returns_model_answer() {
        let h = harness();
        let out = h.dispatcher.handle("s1", "hoi").await.unwrap();
        assert_eq!(out.decision.decision, Decision::Allow);
        assert_eq!(out.reply, "echo: hoi");
        assert!(out.ethics_categories.is_empty());
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn soft_stop_prefixes_message_and_still_answers() {
        let h = harness_with(WellbeingPolicy::default(), at(23, 30));
        let out = h.dispatcher.handle("s1", "hoi").await.unwrap();
        assert_eq!(out.decision.decision, Decision::SoftStop);
        assert_eq!(out.reply, format!("{NIGHT_MESSAGE}\n\necho: hoi"));
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn meal_soft_stop_names_the_meal() {
        let h = harness_with(WellbeingPolicy::default(), at(12, 40));
        let out = h.dispatcher.handle("s1", "hoi").await.unwrap();
        assert_eq!(out.decision.decision, Decision::SoftStop);
        assert!(out.reply.starts_with(&meal_message("lunch")));
    }

    #[tokio::test]
    async fn hard_stop_skips_the_model() {
        let policy = WellbeingPolicy {
            max_messages_per_session: 2,
            ..WellbeingPolicy::default()
        };
        let h = harness_with(policy, at(10, 0));

        h.dispatcher.handle("s1", "een").await.unwrap();
        let out = h.dispatcher.handle("s1", "twee").await.unwrap();

        assert_eq!(out.decision.decision, Decision::HardStop);
        assert_eq!(out.reply, MESSAGE_COUNT_MESSAGE);
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn session_duration_cap_dominates() {
        let h = harness();
        h.dispatcher.handle("s1", "hoi").await.unwrap();

        // Jump into the night as well: duration still wins
        h.clock.set(at(10, 0) + chrono::Duration::minutes(14 * 60));
        let out = h.dispatcher.handle("s1", "nog even").await.unwrap();
        assert_eq!(out.decision.decision, Decision::HardStop);
        assert!(out.reply.starts_with(SESSION_DURATION_MESSAGE));
    }

    #[tokio::test]
    async fn sessions_track_wellbeing_separately() {
        let policy = WellbeingPolicy {
            max_messages_per_session: 2,
            ..WellbeingPolicy::default()
        };
        let h = harness_with(policy, at(10, 0));

        h.dispatcher.handle("a", "1").await.unwrap();
        let a = h.dispatcher.handle("a", "2").await.unwrap();
        let b = h.dispatcher.handle("b", "1").await.unwrap();

        assert_eq!(a.decision.decision, Decision::HardStop);
        assert_eq!(b.decision.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn ethics_annotates_on_user_input() {
        let h = harness();
        let out = h
            .dispatcher
            .handle("s1", "Moet ik Bitcoin kopen?")
            .await
            .unwrap();
        assert_eq!(out.ethics_categories, vec!["crypto".to_string()]);
        assert!(out.reply.starts_with("echo: Moet ik Bitcoin kopen?\n\n[ETHICS] "));
    }

    #[tokio::test]
    async fn hard_stop_still_carries_ethics_for_the_input() {
        let policy = WellbeingPolicy {
            max_messages_per_session: 1,
            ..WellbeingPolicy::default()
        };
        let h = harness_with(policy, at(10, 0));

        let out = h.dispatcher.handle("s1", "ik wil naar het casino").await.unwrap();
        assert_eq!(out.decision.decision, Decision::HardStop);
        assert_eq!(out.ethics_categories, vec!["gambling".to_string()]);
        assert!(out.reply.starts_with(MESSAGE_COUNT_MESSAGE));
        assert!(out.reply.contains("[ETHICS]"));
    }

    #[tokio::test]
    async fn hard_stop_message_alone_adds_no_annotation() {
        let policy = WellbeingPolicy {
            max_messages_per_session: 1,
            ..WellbeingPolicy::default()
        };
        let h = harness_with(policy, at(10, 0));

        let out = h.dispatcher.handle("s1", "hoi").await.unwrap();
        assert_eq!(out.reply, MESSAGE_COUNT_MESSAGE);
        assert!(out.ethics_categories.is_empty());
    }

    #[tokio::test]
    async fn model_failure_is_reported_and_counted() {
        let (dispatcher, _clock) = build(
            Arc::new(FailingProvider),
            WellbeingPolicy::default(),
            at(10, 0),
        );

        let err = dispatcher.handle("s1", "hoi").await.unwrap_err();
        assert!(matches!(err, PdaError::ModelUnavailable(_)));

        let metrics = dispatcher.metrics().render().unwrap();
        assert!(metrics.contains("pda_model_errors_total 1"));

        // The message still counts toward the wellbeing limits
        let handle = dispatcher.sessions().get("s1").await.unwrap().unwrap();
        let conversation = handle.lock().await;
        assert_eq!(conversation.state.messages_count, 1);
        assert_eq!(conversation.agent.history().len(), 1);
    }

    #[tokio::test]
    async fn turns_are_recorded_in_metrics() {
        let h = harness();
        h.dispatcher.handle("s1", "hoi").await.unwrap();
        h.dispatcher.handle("s2", "hoi").await.unwrap();

        let metrics = h.dispatcher.metrics().render().unwrap();
        assert!(metrics.contains(r#"pda_turns_total{decision="allow"} 2"#));
        assert!(metrics.contains("pda_active_sessions 2"));
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_are_serialized() {
        let provider = Arc::new(
            ScriptedProvider::new().with_delay(std::time::Duration::from_millis(20)),
        );
        let (dispatcher, _clock) =
            build(provider.clone(), WellbeingPolicy::default(), at(10, 0));
        let dispatcher = Arc::new(dispatcher);

        let mut tasks = Vec::new();
        for i in 0..4 {
            let d = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                d.handle("shared", &format!("bericht {i}")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Each call saw a strictly alternating history
        for (n, call) in provider.calls().iter().enumerate() {
            assert_eq!(call.len(), 2 + 2 * n);
        }
        let handle = dispatcher.sessions().get("shared").await.unwrap().unwrap();
        assert_eq!(handle.lock().await.state.messages_count, 4);
    }

    #[tokio::test]
    async fn aborted_turn_keeps_history_alternating() {
        let provider = Arc::new(
            ScriptedProvider::new().with_delay(std::time::Duration::from_millis(200)),
        );
        let (dispatcher, _clock) =
            build(provider.clone(), WellbeingPolicy::default(), at(10, 0));
        let dispatcher = Arc::new(dispatcher);

        let d = dispatcher.clone();
        let task = tokio::spawn(async move { d.handle("s", "eerste").await });
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let handle = dispatcher.sessions().get("s").await.unwrap().unwrap();
        let roles: Vec<String> = handle
            .lock()
            .await
            .agent
            .history()
            .iter()
            .map(|m| m.role.clone())
            .collect();
        assert_eq!(roles, ["system"]);

        // The next turn sends a single user message after the system prompt
        let out = dispatcher.handle("s", "tweede").await.unwrap();
        assert_eq!(out.reply, "echo: tweede");
        let last_call = provider.calls().pop().unwrap();
        assert_eq!(last_call.len(), 2);
        assert_eq!(last_call[1].role, "user");
    }

    #[tokio::test]
    async fn full_store_keeps_busy_sessions() {
        let provider = Arc::new(
            ScriptedProvider::new().with_delay(std::time::Duration::from_millis(100)),
        );
        let clock = Arc::new(FixedClock::new(at(10, 0)));
        let store = InMemorySessionStore::new(factory(provider), 1).with_clock(clock.clone());
        let dispatcher = Arc::new(TurnDispatcher::new(
            Arc::new(store),
            TemporalWellbeingGuard::with_clock(WellbeingPolicy::default(), clock),
            EthicsFilter::new(Vec::new()),
            Arc::new(Metrics::new().unwrap()),
        ));

        let d = dispatcher.clone();
        let first = tokio::spawn(async move { d.handle("a", "hoi").await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        dispatcher.handle("b", "hallo").await.unwrap();
        first.await.unwrap().unwrap();

        let handle = dispatcher.sessions().get("a").await.unwrap().unwrap();
        let conversation = handle.lock().await;
        assert_eq!(conversation.state.messages_count, 1);
        assert_eq!(conversation.agent.history().len(), 3);
    }
}
