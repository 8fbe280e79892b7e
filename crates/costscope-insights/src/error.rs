//! Error types for budget evaluation and anomaly detection.

use costscope_types::Currency;

/// Errors surfaced by the insights layer.
///
/// Evaluation and detection are pure functions over caller-supplied data,
/// so every failure is either a bad input (policy, config, or batch shape)
/// or an arithmetic overflow while summing; there is nothing to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsightsError {
    /// An operation that requires input data received none.
    #[error("empty input for {operation}")]
    EmptyInput {
        /// The operation that rejected the empty input.
        operation: &'static str,
    },

    /// A budget policy failed validation.
    #[error("invalid budget policy {name}: {reason}")]
    InvalidPolicy {
        /// Name of the offending policy.
        name: String,
        /// What the policy got wrong.
        reason: String,
    },

    /// An anomaly detector configuration failed validation.
    #[error("invalid anomaly detector config: {reason}")]
    InvalidConfig {
        /// What the configuration got wrong.
        reason: String,
    },

    /// Too few data points for a statistically meaningful result.
    #[error("insufficient data: {required} points required, got {actual}")]
    InsufficientData {
        /// Minimum number of points the operation needs.
        required: usize,
        /// Number of points actually supplied.
        actual: usize,
    },

    /// A matched attribution's currency differs from the policy's.
    #[error("currency mismatch for policy {policy}: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Name of the policy being evaluated.
        policy: String,
        /// The policy's currency.
        expected: Currency,
        /// The attribution's currency.
        found: Currency,
    },

    /// A checked decimal operation exhausted the representable range.
    #[error("arithmetic overflow during {context}")]
    ArithmeticOverflow {
        /// The computation that overflowed.
        context: &'static str,
    },
}
