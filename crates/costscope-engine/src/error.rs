//! Error types for the cost engine.
//!
//! [`EngineError`] is the single error type returned by normalization,
//! calculation, attribution, and summary operations. Every variant maps to
//! one of four [`ErrorKind`] categories so callers can branch on the class
//! of failure (reject the input, fix the deployment, supply more data, or
//! treat as an integrity alert) without matching every variant.

use costscope_types::{Currency, ScopeType};

/// Broad category of an engine failure.
///
/// | Kind | Meaning | Typical caller response |
/// |------|---------|------------------------|
/// | `Validation` | The input data is malformed or inconsistent | Reject the batch |
/// | `Configuration` | Pricing or normalization setup is incomplete | Fix the deployment |
/// | `Precondition` | The operation needs input it was not given | Supply data, or skip |
/// | `Arithmetic` | A counter or money computation overflowed | Integrity alert |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input data is malformed or inconsistent with the pricing table.
    Validation,
    /// Pricing or normalization configuration is missing or incomplete.
    Configuration,
    /// The operation requires input that was not provided.
    Precondition,
    /// An arithmetic operation overflowed its representation.
    Arithmetic,
}

/// Errors produced by the cost engine.
///
/// The engine never panics on bad input; every failure mode is a variant
/// here and batch operations abort on the first error encountered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The usage record's provider does not match the pricing table's.
    #[error("provider mismatch: usage record has '{usage}', pricing table has '{pricing}'")]
    ProviderMismatch {
        /// Provider named on the usage record.
        usage: String,
        /// Provider named on the pricing table.
        pricing: String,
    },

    /// The usage record's model does not match the pricing table's.
    #[error("model mismatch: usage record has '{usage}', pricing table has '{pricing}'")]
    ModelMismatch {
        /// Model named on the usage record.
        usage: String,
        /// Model named on the pricing table.
        pricing: String,
    },

    /// A usage record carried a request count of zero.
    #[error("request count must be at least 1 on execution '{execution_id}'")]
    ZeroRequestCount {
        /// Execution whose record failed validation.
        execution_id: String,
    },

    /// Records with different currencies were grouped into one scope, or
    /// attributions with different currencies were summarized together.
    #[error(
        "currency mismatch in {scope:?} aggregation: expected {expected}, found {found}"
    )]
    CurrencyMismatch {
        /// The scope being aggregated when the mismatch was found.
        scope: ScopeType,
        /// Currency of the first record or attribution seen.
        expected: Currency,
        /// The conflicting currency.
        found: Currency,
    },

    /// A tiered pricing table has an empty tier list.
    #[error("tiered pricing for {provider}/{model} has no tiers configured")]
    NoTiersConfigured {
        /// Provider of the misconfigured table.
        provider: String,
        /// Model of the misconfigured table.
        model: String,
    },

    /// No tier in a tiered pricing table covers the record's total tokens.
    #[error(
        "no pricing tier covers {total_tokens} total tokens for {provider}/{model}"
    )]
    NoTierForTotal {
        /// Total token count that fell outside every tier.
        total_tokens: u64,
        /// Provider of the pricing table.
        provider: String,
        /// Model of the pricing table.
        model: String,
    },

    /// No exchange rate was supplied for the requested conversion.
    #[error("no exchange rate configured for '{key}'")]
    ExchangeRateNotFound {
        /// The lookup key, formatted as `FROM_TO` (for example `USD_EUR`).
        key: String,
    },

    /// A batch operation received an empty input slice.
    #[error("{operation} requires at least one input record")]
    EmptyBatch {
        /// The operation that rejected the empty input.
        operation: &'static str,
    },

    /// Summary generation received no attributions.
    #[error("summary generation requires at least one attribution")]
    EmptySummaryInput,

    /// Character-estimate normalization was requested without a
    /// `average_chars_per_token` value.
    #[error("normalization entry for '{provider}' has no average chars per token")]
    MissingCharsPerToken {
        /// Provider of the incomplete normalization entry.
        provider: String,
    },

    /// A normalization report was requested over records whose original
    /// token totals sum to zero.
    #[error("normalization report requires a non-zero original token total")]
    ZeroOriginalTokens,

    /// An integer or decimal computation overflowed.
    #[error("arithmetic overflow during {context}")]
    ArithmeticOverflow {
        /// What was being computed when the overflow occurred.
        context: &'static str,
    },
}

impl EngineError {
    /// The broad category this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ProviderMismatch { .. }
            | Self::ModelMismatch { .. }
            | Self::ZeroRequestCount { .. }
            | Self::CurrencyMismatch { .. } => ErrorKind::Validation,
            Self::NoTiersConfigured { .. }
            | Self::NoTierForTotal { .. }
            | Self::ExchangeRateNotFound { .. }
            | Self::MissingCharsPerToken { .. } => ErrorKind::Configuration,
            Self::EmptyBatch { .. } | Self::EmptySummaryInput | Self::ZeroOriginalTokens => {
                ErrorKind::Precondition
            }
            Self::ArithmeticOverflow { .. } => ErrorKind::Arithmetic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_partition_the_variants() {
        let validation = EngineError::ProviderMismatch {
            usage: "anthropic".to_owned(),
            pricing: "openai".to_owned(),
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let configuration = EngineError::NoTiersConfigured {
            provider: "openai".to_owned(),
            model: "gpt-4o".to_owned(),
        };
        assert_eq!(configuration.kind(), ErrorKind::Configuration);

        let precondition = EngineError::EmptySummaryInput;
        assert_eq!(precondition.kind(), ErrorKind::Precondition);

        let arithmetic = EngineError::ArithmeticOverflow {
            context: "token total",
        };
        assert_eq!(arithmetic.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn display_names_both_sides_of_a_mismatch() {
        let error = EngineError::ModelMismatch {
            usage: "claude-3-opus".to_owned(),
            pricing: "claude-3-sonnet".to_owned(),
        };
        let message = error.to_string();
        assert!(message.contains("claude-3-opus"));
        assert!(message.contains("claude-3-sonnet"));
    }

    #[test]
    fn display_includes_exchange_key() {
        let error = EngineError::ExchangeRateNotFound {
            key: "USD_EUR".to_owned(),
        };
        assert!(error.to_string().contains("USD_EUR"));
    }
}
