/// A content-safety check that contributes a warning when it matches.
///
/// Implementations receive text that is already lower-cased and must be
/// stateless so one rule set can be shared across every session.
pub trait EthicsRule: Send + Sync {
    /// Category name used in logs and metrics (e.g. `"crypto"`).
    fn category(&self) -> &str;

    /// Whether this rule applies to the given lower-cased text.
    fn matches(&self, text: &str) -> bool;

    /// Warning block appended to the reply, including its leading separator.
    fn warning(&self) -> &str;
}
