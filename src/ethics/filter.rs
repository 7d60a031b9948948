//! Stateless reply annotator over an ordered rule set.

use super::traits::EthicsRule;

/// Result of [`EthicsFilter::apply_with_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthicsReport {
    pub text: String,
    /// Categories whose warning was appended, in application order.
    pub categories: Vec<String>,
}

/// Appends fixed warning blocks to a reply for every matching rule.
///
/// Each rule sees `lowercase(user_input + " " + text)` where `text` already
/// carries the warnings of earlier rules. Applying the filter twice appends
/// the warnings again.
pub struct EthicsFilter {
    rules: Vec<Box<dyn EthicsRule>>,
}

impl EthicsFilter {
    pub fn new(rules: Vec<Box<dyn EthicsRule>>) -> Self {
        Self { rules }
    }

    /// A filter that never annotates.
    pub fn disabled() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn categories(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.category()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, reply: &str, user_input: &str) -> String {
        self.apply_with_report(reply, user_input).text
    }

    pub fn apply_with_report(&self, reply: &str, user_input: &str) -> EthicsReport {
        let input = user_input.to_lowercase();
        let mut text = reply.to_string();
        let mut categories = Vec::new();

        for rule in &self.rules {
            let haystack = format!("{input} {}", text.to_lowercase());
            if rule.matches(&haystack) {
                text.push_str(rule.warning());
                categories.push(rule.category().to_string());
            }
        }

        EthicsReport { text, categories }
    }
}
