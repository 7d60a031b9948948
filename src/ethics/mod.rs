//! Keyword-based content-safety annotations.
//!
//! The rule set is built once at startup from `[ethics]` config: the six
//! built-in categories (minus any disabled ones) followed by custom keyword
//! rules. Rules implement [`EthicsRule`] so alternative matchers can be
//! composed without touching the filter.

pub mod filter;
pub mod keyword;
pub mod traits;

pub use filter::{EthicsFilter, EthicsReport};
pub use keyword::{builtin_rules, KeywordRule, BUILTIN_CATEGORIES};
pub use traits::EthicsRule;

use crate::config::EthicsConfig;

/// Factory: build the filter described by the `[ethics]` section.
pub fn create_ethics_filter(config: &EthicsConfig) -> EthicsFilter {
    if !config.enabled {
        tracing::info!("Ethics annotations disabled by config");
        return EthicsFilter::disabled();
    }

    let mut rules: Vec<Box<dyn EthicsRule>> = Vec::new();
    for rule in builtin_rules() {
        if config
            .disabled_categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(rule.category()))
        {
            continue;
        }
        rules.push(Box::new(rule));
    }
    for custom in &config.rules {
        rules.push(Box::new(KeywordRule::new(
            custom.category.clone(),
            &custom.keywords,
            &custom.warning,
        )));
    }

    EthicsFilter::new(rules)
}
