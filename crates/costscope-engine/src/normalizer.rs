//! Cross-provider token-count normalization.
//!
//! Providers tokenize the same text differently, so raw token counts are
//! not comparable across providers. The normalizer rescales counts onto a
//! common basis using a registry of per-provider (optionally per-model)
//! entries. Exact `provider + model` entries win over provider-wide
//! entries; providers with no entry pass through unchanged.
//!
//! # Method selection
//!
//! Per matched entry, in priority order:
//!
//! | Priority | Condition | Method | Per-field rule |
//! |----------|-----------|--------|----------------|
//! | 1 | both input and output factors set | `Factor` | `round(count × factor)` |
//! | 2 | `average_chars_per_token` set | `CharacterEstimate` | `round(count × chars/baseline)` |
//! | 3 | neither | `Raw` | unchanged |
//!
//! The character estimate treats the provider's token counts as a proxy
//! for character volume and rescales onto the baseline tokenizer density
//! (4.0 characters per token by default). Input and output each receive
//! their proportional share of the rescaled total, which reduces to
//! multiplying each field by `chars_per_token / baseline` before rounding.
//! Cached counts pass through untouched under the estimate; under the
//! factor method they are scaled only when a cached factor is configured.
//!
//! Normalization never fails for valid input: unknown providers are not an
//! error, they are simply raw. The batch analytics (factor variance and
//! the normalization report) use `f64` -- they are diagnostics, never
//! money.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use costscope_types::{NormalizationMethod, NormalizedUsage, UsageRecord};

use crate::error::EngineError;
use crate::settings::NormalizationSettings;

/// Baseline tokenizer density the estimate method rescales onto.
const DEFAULT_BASELINE_CHARS: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

// ---------------------------------------------------------------------------
// Registry entries
// ---------------------------------------------------------------------------

/// One normalization registry entry.
///
/// `model = None` makes the entry apply provider-wide; a `Some` model is
/// an exact-match override. Factor fields drive the factor method, the
/// chars-per-token field drives the character estimate; an entry carrying
/// neither is an explicit raw passthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCountingConfig {
    /// Provider the entry applies to.
    pub provider: String,

    /// Model the entry applies to; `None` for provider-wide entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Multiplier applied to input token counts (factor method).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_factor: Option<Decimal>,

    /// Multiplier applied to output token counts (factor method).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_factor: Option<Decimal>,

    /// Multiplier applied to cached input token counts (factor method);
    /// cached counts pass through raw when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_token_factor: Option<Decimal>,

    /// Average characters per token of the provider's tokenizer
    /// (character-estimate method).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_chars_per_token: Option<Decimal>,
}

impl TokenCountingConfig {
    /// Provider-wide factor entry.
    pub fn factors(
        provider: impl Into<String>,
        input_token_factor: Decimal,
        output_token_factor: Decimal,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            input_token_factor: Some(input_token_factor),
            output_token_factor: Some(output_token_factor),
            cached_token_factor: None,
            average_chars_per_token: None,
        }
    }

    /// Provider-wide character-estimate entry.
    pub fn character_estimate(
        provider: impl Into<String>,
        average_chars_per_token: Decimal,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            input_token_factor: None,
            output_token_factor: None,
            cached_token_factor: None,
            average_chars_per_token: Some(average_chars_per_token),
        }
    }

    /// Narrow the entry to one model (exact matches win over provider-wide
    /// entries).
    #[must_use]
    pub fn for_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the cached-token multiplier.
    #[must_use]
    pub const fn with_cached_factor(mut self, cached_token_factor: Decimal) -> Self {
        self.cached_token_factor = Some(cached_token_factor);
        self
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Registry key: provider plus optional model.
type RegistryKey = (String, Option<String>);

/// Rescales provider token counts onto a common basis.
///
/// Stateless apart from the registry contents; safe to share across
/// threads behind a shared reference and normalization is a pure function
/// of the record and the registry.
#[derive(Debug, Clone)]
pub struct TokenNormalizer {
    /// Tokenizer density that character estimates rescale onto.
    baseline_chars_per_token: Decimal,

    /// Registry entries; exact `(provider, Some(model))` keys win over
    /// `(provider, None)` keys.
    entries: BTreeMap<RegistryKey, TokenCountingConfig>,
}

impl TokenNormalizer {
    /// Create a normalizer with no registry entries (everything raw).
    pub const fn empty() -> Self {
        Self {
            baseline_chars_per_token: DEFAULT_BASELINE_CHARS,
            entries: BTreeMap::new(),
        }
    }

    /// Create a normalizer pre-loaded with entries for well-known
    /// providers.
    ///
    /// The built-in table treats the `openai` tokenizer as the baseline
    /// (identity factors), estimates `anthropic`, `google`, and `cohere`
    /// from their published tokenizer densities, and carries one
    /// model-specific override to keep the exact-match path exercised.
    pub fn with_defaults() -> Self {
        let mut normalizer = Self::empty();
        for entry in builtin_entries() {
            normalizer.register(entry);
        }
        normalizer
    }

    /// Build a normalizer from loaded settings, merged over the built-in
    /// defaults.
    pub fn from_settings(settings: &NormalizationSettings) -> Self {
        let mut normalizer = Self::with_defaults();
        normalizer.baseline_chars_per_token = settings.baseline_chars_per_token;
        for entry in &settings.entries {
            normalizer.register(entry.clone());
        }
        normalizer
    }

    /// Add or replace a registry entry.
    pub fn register(&mut self, config: TokenCountingConfig) {
        let key = (config.provider.clone(), config.model.clone());
        self.entries.insert(key, config);
    }

    /// Rescale one usage record onto the common token basis.
    ///
    /// Never fails: unknown providers and models pass through raw with an
    /// identity factor.
    pub fn normalize(&self, usage: &UsageRecord) -> NormalizedUsage {
        let Some(config) = self.lookup(&usage.provider, &usage.model) else {
            return identity(usage);
        };

        if let (Some(input_factor), Some(output_factor)) =
            (config.input_token_factor, config.output_token_factor)
        {
            return factor_normalize(usage, input_factor, output_factor, config.cached_token_factor);
        }

        if let Some(chars_per_token) = config.average_chars_per_token {
            return estimate_normalize(usage, chars_per_token, self.baseline_chars_per_token);
        }

        identity(usage)
    }

    /// Apply the character-estimate method with an explicit entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingCharsPerToken`] when the entry has no
    /// `average_chars_per_token` value.
    pub fn character_estimate(
        &self,
        usage: &UsageRecord,
        config: &TokenCountingConfig,
    ) -> Result<NormalizedUsage, EngineError> {
        let chars_per_token =
            config
                .average_chars_per_token
                .ok_or_else(|| EngineError::MissingCharsPerToken {
                    provider: config.provider.clone(),
                })?;
        Ok(estimate_normalize(
            usage,
            chars_per_token,
            self.baseline_chars_per_token,
        ))
    }

    /// Normalize a batch element-wise. No cross-record state; an empty
    /// batch yields an empty vector.
    pub fn normalize_batch(&self, usages: &[UsageRecord]) -> Vec<NormalizedUsage> {
        usages.iter().map(|usage| self.normalize(usage)).collect()
    }

    /// Distribution statistics over the factors a batch actually used.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyBatch`] for an empty batch.
    pub fn normalization_variance(
        batch: &[NormalizedUsage],
    ) -> Result<FactorVariance, EngineError> {
        if batch.is_empty() {
            return Err(EngineError::EmptyBatch {
                operation: "normalization variance",
            });
        }

        let factors: Vec<f64> = batch
            .iter()
            .map(|normalized| normalized.normalization_factor.to_f64().unwrap_or(0.0))
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let count_f = factors.len() as f64;
        let sum: f64 = factors.iter().sum();
        let mean = sum / count_f;

        let variance_sum: f64 = factors
            .iter()
            .map(|factor| {
                let diff = factor - mean;
                diff * diff
            })
            .sum();
        let stddev = (variance_sum / count_f).sqrt();

        let min = factors.iter().copied().fold(f64::INFINITY, f64::min);
        let max = factors.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(FactorVariance {
            mean,
            stddev,
            min,
            max,
        })
    }

    /// Per-method and per-provider totals for a normalized batch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyBatch`] for an empty batch and
    /// [`EngineError::ZeroOriginalTokens`] when the batch's original token
    /// counts sum to zero (the overall ratio would divide by zero).
    pub fn normalization_report(
        batch: &[NormalizedUsage],
    ) -> Result<NormalizationReport, EngineError> {
        if batch.is_empty() {
            return Err(EngineError::EmptyBatch {
                operation: "normalization report",
            });
        }

        let mut raw_records = 0u64;
        let mut factor_records = 0u64;
        let mut estimate_records = 0u64;
        let mut provider_totals: BTreeMap<String, ProviderTokenTotals> = BTreeMap::new();
        let mut total_original_tokens = 0u64;
        let mut total_normalized_tokens = 0u64;

        for normalized in batch {
            match normalized.normalization_method {
                NormalizationMethod::Raw => raw_records = raw_records.saturating_add(1),
                NormalizationMethod::Factor => factor_records = factor_records.saturating_add(1),
                NormalizationMethod::CharacterEstimate => {
                    estimate_records = estimate_records.saturating_add(1);
                }
            }

            let original = normalized.record.total_tokens();
            let rescaled = normalized.total_normalized_tokens;
            total_original_tokens = total_original_tokens.saturating_add(original);
            total_normalized_tokens = total_normalized_tokens.saturating_add(rescaled);

            let provider = provider_totals
                .entry(normalized.record.provider.clone())
                .or_default();
            provider.original_tokens = provider.original_tokens.saturating_add(original);
            provider.normalized_tokens = provider.normalized_tokens.saturating_add(rescaled);
            provider.record_count = provider.record_count.saturating_add(1);
        }

        if total_original_tokens == 0 {
            return Err(EngineError::ZeroOriginalTokens);
        }

        // Totals are bounded by realistic token volumes; safe to represent
        // as f64 for a diagnostic ratio.
        #[allow(clippy::cast_precision_loss)]
        let overall_ratio = total_normalized_tokens as f64 / total_original_tokens as f64;

        Ok(NormalizationReport {
            raw_records,
            factor_records,
            estimate_records,
            provider_totals,
            total_original_tokens,
            total_normalized_tokens,
            overall_ratio,
        })
    }

    fn lookup(&self, provider: &str, model: &str) -> Option<&TokenCountingConfig> {
        let exact = (provider.to_owned(), Some(model.to_owned()));
        if let Some(config) = self.entries.get(&exact) {
            return Some(config);
        }
        let provider_wide = (provider.to_owned(), None);
        self.entries.get(&provider_wide)
    }
}

impl Default for TokenNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Built-in registry entries for well-known providers.
fn builtin_entries() -> Vec<TokenCountingConfig> {
    vec![
        // openai's tokenizer is the baseline the other entries rescale to.
        TokenCountingConfig::factors("openai", Decimal::ONE, Decimal::ONE),
        TokenCountingConfig::character_estimate("anthropic", Decimal::new(38, 1)),
        TokenCountingConfig::character_estimate("google", Decimal::new(42, 1)),
        TokenCountingConfig::character_estimate("cohere", Decimal::new(44, 1)),
        // Model-specific override: measured denser than the provider-wide
        // estimate.
        TokenCountingConfig::factors("anthropic", Decimal::new(97, 2), Decimal::new(97, 2))
            .for_model("claude-3-haiku"),
    ]
}

// ---------------------------------------------------------------------------
// Batch analytics results
// ---------------------------------------------------------------------------

/// Distribution of the normalization factors a batch used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorVariance {
    /// Arithmetic mean of the factors.
    pub mean: f64,
    /// Population standard deviation of the factors.
    pub stddev: f64,
    /// Smallest factor seen.
    pub min: f64,
    /// Largest factor seen.
    pub max: f64,
}

/// Token totals for one provider inside a [`NormalizationReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderTokenTotals {
    /// Original token total across the provider's records.
    pub original_tokens: u64,
    /// Normalized token total across the provider's records.
    pub normalized_tokens: u64,
    /// Number of records from the provider.
    pub record_count: u64,
}

/// Batch-level normalization accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationReport {
    /// Records that passed through raw.
    pub raw_records: u64,
    /// Records normalized with the factor method.
    pub factor_records: u64,
    /// Records normalized with the character estimate.
    pub estimate_records: u64,
    /// Original and normalized token totals per provider.
    pub provider_totals: BTreeMap<String, ProviderTokenTotals>,
    /// Original token total across the batch.
    pub total_original_tokens: u64,
    /// Normalized token total across the batch.
    pub total_normalized_tokens: u64,
    /// `total_normalized_tokens / total_original_tokens` as a diagnostic
    /// ratio.
    pub overall_ratio: f64,
}

// ---------------------------------------------------------------------------
// Method implementations
// ---------------------------------------------------------------------------

fn identity(usage: &UsageRecord) -> NormalizedUsage {
    NormalizedUsage {
        record: usage.clone(),
        normalized_input_tokens: usage.input_tokens,
        normalized_output_tokens: usage.output_tokens,
        normalized_cached_tokens: usage.cached_input_tokens,
        total_normalized_tokens: usage.total_tokens(),
        normalization_factor: Decimal::ONE,
        normalization_method: NormalizationMethod::Raw,
    }
}

fn factor_normalize(
    usage: &UsageRecord,
    input_factor: Decimal,
    output_factor: Decimal,
    cached_factor: Option<Decimal>,
) -> NormalizedUsage {
    let normalized_input_tokens = scale_count(usage.input_tokens, input_factor);
    let normalized_output_tokens = scale_count(usage.output_tokens, output_factor);

    // Cached counts rescale only when both cached tokens and a cached
    // factor exist; a factor applied to nothing does not enter the mean.
    let mut applied = vec![input_factor, output_factor];
    let normalized_cached_tokens = match (usage.cached_input_tokens, cached_factor) {
        (Some(cached), Some(factor)) => {
            applied.push(factor);
            Some(scale_count(cached, factor))
        }
        (Some(cached), None) => Some(cached),
        (None, _) => None,
    };

    let total_normalized_tokens = normalized_input_tokens
        .saturating_add(normalized_output_tokens)
        .saturating_add(normalized_cached_tokens.unwrap_or(0));

    NormalizedUsage {
        record: usage.clone(),
        normalized_input_tokens,
        normalized_output_tokens,
        normalized_cached_tokens,
        total_normalized_tokens,
        normalization_factor: mean_of(&applied),
        normalization_method: NormalizationMethod::Factor,
    }
}

fn estimate_normalize(
    usage: &UsageRecord,
    chars_per_token: Decimal,
    baseline: Decimal,
) -> NormalizedUsage {
    // Redistributing the rescaled total by the original input:output ratio
    // is the same as multiplying each field by chars/baseline, and the
    // per-field form has no zero-total corner case.
    let factor = chars_per_token.checked_div(baseline).unwrap_or(Decimal::ONE);

    let normalized_input_tokens = scale_count(usage.input_tokens, factor);
    let normalized_output_tokens = scale_count(usage.output_tokens, factor);
    let normalized_cached_tokens = usage.cached_input_tokens;

    let total_normalized_tokens = normalized_input_tokens
        .saturating_add(normalized_output_tokens)
        .saturating_add(normalized_cached_tokens.unwrap_or(0));

    NormalizedUsage {
        record: usage.clone(),
        normalized_input_tokens,
        normalized_output_tokens,
        normalized_cached_tokens,
        total_normalized_tokens,
        normalization_factor: factor,
        normalization_method: NormalizationMethod::CharacterEstimate,
    }
}

/// `round(count × factor)` with saturation at the `u64` boundaries.
fn scale_count(count: u64, factor: Decimal) -> u64 {
    if factor.is_sign_negative() {
        return 0;
    }
    Decimal::from(count)
        .checked_mul(factor)
        .and_then(|scaled| scaled.round().to_u64())
        .unwrap_or(u64::MAX)
}

fn mean_of(factors: &[Decimal]) -> Decimal {
    let count = Decimal::from(factors.len());
    let sum = factors
        .iter()
        .try_fold(Decimal::ZERO, |acc, factor| acc.checked_add(*factor));
    sum.and_then(|total| total.checked_div(count))
        .unwrap_or(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(provider: &str, model: &str, input: u64, output: u64) -> UsageRecord {
        UsageRecord::new("exec-1", "ag1", provider, model, input, output)
    }

    #[test]
    fn unknown_provider_passes_through_raw() {
        let normalizer = TokenNormalizer::with_defaults();
        let normalized = normalizer.normalize(&usage("acme", "x1", 100, 50));

        assert_eq!(normalized.normalized_input_tokens, 100);
        assert_eq!(normalized.normalized_output_tokens, 50);
        assert_eq!(normalized.normalization_factor, Decimal::ONE);
        assert_eq!(normalized.normalization_method, NormalizationMethod::Raw);
        assert_eq!(normalized.total_normalized_tokens, 150);
    }

    #[test]
    fn factor_entries_scale_each_field() {
        let mut normalizer = TokenNormalizer::empty();
        normalizer.register(TokenCountingConfig::factors(
            "acme",
            Decimal::new(11, 1), // 1.1
            Decimal::new(9, 1),  // 0.9
        ));
        let normalized = normalizer.normalize(&usage("acme", "x1", 100, 50));

        assert_eq!(normalized.normalized_input_tokens, 110);
        assert_eq!(normalized.normalized_output_tokens, 45);
        assert_eq!(normalized.normalization_method, NormalizationMethod::Factor);
        // Mean of 1.1 and 0.9.
        assert_eq!(normalized.normalization_factor, Decimal::ONE);
    }

    #[test]
    fn cached_factor_scales_cached_tokens_and_joins_the_mean() {
        let mut normalizer = TokenNormalizer::empty();
        normalizer.register(
            TokenCountingConfig::factors("acme", Decimal::ONE, Decimal::ONE)
                .with_cached_factor(Decimal::new(13, 1)), // 1.3
        );
        let record = usage("acme", "x1", 100, 50).with_cached_tokens(100);
        let normalized = normalizer.normalize(&record);

        assert_eq!(normalized.normalized_cached_tokens, Some(130));
        assert_eq!(normalized.total_normalized_tokens, 280);
        // Mean of 1.0, 1.0, 1.3.
        assert_eq!(normalized.normalization_factor, Decimal::new(11, 1));
    }

    #[test]
    fn cached_tokens_without_cached_factor_pass_raw() {
        let mut normalizer = TokenNormalizer::empty();
        normalizer.register(TokenCountingConfig::factors(
            "acme",
            Decimal::new(2, 0),
            Decimal::new(2, 0),
        ));
        let record = usage("acme", "x1", 100, 50).with_cached_tokens(40);
        let normalized = normalizer.normalize(&record);

        assert_eq!(normalized.normalized_cached_tokens, Some(40));
        assert_eq!(normalized.total_normalized_tokens, 200 + 100 + 40);
        // Only the two applied factors enter the mean.
        assert_eq!(normalized.normalization_factor, Decimal::new(2, 0));
    }

    #[test]
    fn model_entry_wins_over_provider_entry() {
        let normalizer = TokenNormalizer::with_defaults();

        let model_specific = normalizer.normalize(&usage("anthropic", "claude-3-haiku", 1000, 0));
        assert_eq!(
            model_specific.normalization_method,
            NormalizationMethod::Factor
        );
        assert_eq!(model_specific.normalized_input_tokens, 970);

        let provider_wide = normalizer.normalize(&usage("anthropic", "claude-3-opus", 1000, 0));
        assert_eq!(
            provider_wide.normalization_method,
            NormalizationMethod::CharacterEstimate
        );
    }

    #[test]
    fn character_estimate_rescales_by_baseline_ratio() {
        let normalizer = TokenNormalizer::with_defaults();
        let normalized = normalizer.normalize(&usage("anthropic", "claude-3-opus", 1000, 500));

        // 3.8 chars/token against the 4.0 baseline: factor 0.95.
        assert_eq!(normalized.normalization_factor, Decimal::new(95, 2));
        assert_eq!(normalized.normalized_input_tokens, 950);
        assert_eq!(normalized.normalized_output_tokens, 475);
    }

    #[test]
    fn character_estimate_leaves_cached_tokens_raw() {
        let normalizer = TokenNormalizer::with_defaults();
        let record = usage("anthropic", "claude-3-opus", 1000, 0).with_cached_tokens(200);
        let normalized = normalizer.normalize(&record);

        assert_eq!(normalized.normalized_cached_tokens, Some(200));
        assert_eq!(normalized.total_normalized_tokens, 950 + 200);
    }

    #[test]
    fn explicit_estimate_requires_chars_config() {
        let normalizer = TokenNormalizer::empty();
        let config = TokenCountingConfig::factors("acme", Decimal::ONE, Decimal::ONE);
        let result = normalizer.character_estimate(&usage("acme", "x1", 10, 10), &config);

        assert!(matches!(
            result.err(),
            Some(EngineError::MissingCharsPerToken { .. })
        ));
    }

    #[test]
    fn batch_is_element_wise() {
        let normalizer = TokenNormalizer::with_defaults();
        let records = vec![
            usage("acme", "x1", 10, 10),
            usage("anthropic", "claude-3-opus", 1000, 0),
        ];
        let normalized = normalizer.normalize_batch(&records);

        assert_eq!(normalized.len(), 2);
        assert_eq!(
            normalized.first().map(|n| n.normalization_method),
            Some(NormalizationMethod::Raw)
        );
        assert_eq!(
            normalized.get(1).map(|n| n.normalization_method),
            Some(NormalizationMethod::CharacterEstimate)
        );
    }

    #[test]
    fn variance_over_two_known_factors() {
        let mut normalizer = TokenNormalizer::empty();
        normalizer.register(TokenCountingConfig::factors(
            "low",
            Decimal::new(95, 2),
            Decimal::new(95, 2),
        ));
        normalizer.register(TokenCountingConfig::factors(
            "high",
            Decimal::new(105, 2),
            Decimal::new(105, 2),
        ));
        let batch = normalizer.normalize_batch(&[
            usage("low", "m", 100, 100),
            usage("high", "m", 100, 100),
        ]);
        let result = TokenNormalizer::normalization_variance(&batch);

        assert!(result.is_ok());
        if let Ok(variance) = result {
            assert!((variance.mean - 1.0).abs() < 1e-9);
            assert!((variance.stddev - 0.05).abs() < 1e-9);
            assert!((variance.min - 0.95).abs() < 1e-9);
            assert!((variance.max - 1.05).abs() < 1e-9);
        }
    }

    #[test]
    fn variance_rejects_empty_batch() {
        let result = TokenNormalizer::normalization_variance(&[]);
        assert!(matches!(result.err(), Some(EngineError::EmptyBatch { .. })));
    }

    #[test]
    fn report_counts_methods_and_providers() {
        let normalizer = TokenNormalizer::with_defaults();
        let batch = normalizer.normalize_batch(&[
            usage("acme", "x1", 100, 0),
            usage("openai", "gpt-4o", 100, 0),
            usage("anthropic", "claude-3-opus", 1000, 0),
        ]);
        let result = TokenNormalizer::normalization_report(&batch);

        assert!(result.is_ok());
        if let Ok(report) = result {
            assert_eq!(report.raw_records, 1);
            assert_eq!(report.factor_records, 1);
            assert_eq!(report.estimate_records, 1);
            assert_eq!(report.total_original_tokens, 1200);
            assert_eq!(report.total_normalized_tokens, 100 + 100 + 950);
            assert_eq!(
                report
                    .provider_totals
                    .get("anthropic")
                    .map(|totals| totals.normalized_tokens),
                Some(950)
            );
            assert!((report.overall_ratio - 1150.0 / 1200.0).abs() < 1e-9);
        }
    }

    #[test]
    fn report_rejects_zero_original_tokens() {
        let normalizer = TokenNormalizer::empty();
        let batch = normalizer.normalize_batch(&[usage("acme", "x1", 0, 0)]);
        let result = TokenNormalizer::normalization_report(&batch);

        assert!(matches!(
            result.err(),
            Some(EngineError::ZeroOriginalTokens)
        ));
    }

    #[test]
    fn registered_entry_replaces_existing() {
        let mut normalizer = TokenNormalizer::with_defaults();
        normalizer.register(TokenCountingConfig::factors(
            "anthropic",
            Decimal::ONE,
            Decimal::ONE,
        ));
        let normalized = normalizer.normalize(&usage("anthropic", "claude-3-opus", 1000, 0));

        assert_eq!(normalized.normalization_method, NormalizationMethod::Factor);
        assert_eq!(normalized.normalized_input_tokens, 1000);
    }
}
