//! Exact cost calculation from usage records and pricing tables.
//!
//! All monetary calculations use [`rust_decimal::Decimal`] for financial
//! precision -- no floating-point arithmetic. Every cost component is
//! quantized to exactly [`MONEY_SCALE`] fractional digits, and the record
//! total is the checked sum of the quantized components, so the
//! components-balance invariant holds bit-for-bit regardless of summation
//! order.
//!
//! # Pricing dispatch
//!
//! | Model | Cost formula | Components |
//! |-------|--------------|------------|
//! | `PER_TOKEN` | `count × (rate / 1M)` per field | input, output, cached |
//! | `PER_REQUEST` | `request_count × price` | request only |
//! | `TIERED` | `count × tier.price_per_token` per field | input, output, cached |
//!
//! Tier prices are per single token; per-token rates are per million
//! tokens. The tier covering a record is selected by the record's total
//! token count (input + output + cached), tiers considered in ascending
//! `min_tokens` order, first containing tier wins.

use rust_decimal::Decimal;

use costscope_types::{
    CostRecord, CostRecordId, MONEY_SCALE, PricingModel, PricingTable, PricingTier, UsageRecord,
};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;

/// One million, used as the denominator for per-million-token pricing.
///
/// Stored as a constant to avoid repeated construction.
const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// The four cost components of a record, pre-quantization.
struct CostComponents {
    input_token_cost: Decimal,
    output_token_cost: Decimal,
    cached_input_token_cost: Decimal,
    request_cost: Decimal,
}

/// Converts usage records into cost records using exact decimal arithmetic.
///
/// The calculator is stateless apart from its clock; it is safe to share
/// across threads and every calculation is a pure function of its inputs
/// plus one clock read for `calculated_at`.
#[derive(Debug)]
pub struct CostCalculator {
    /// Source of `calculated_at` timestamps.
    clock: Box<dyn Clock>,
}

impl CostCalculator {
    /// Create a calculator stamping records with the system clock.
    pub fn new() -> Self {
        Self {
            clock: Box::new(SystemClock),
        }
    }

    /// Create a calculator with an injected clock (tests pin timestamps
    /// with a fixed clock).
    pub const fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Compute the cost record for one usage record against one pricing
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ProviderMismatch`] or
    /// [`EngineError::ModelMismatch`] when the usage record and pricing
    /// table disagree, [`EngineError::ZeroRequestCount`] when the record
    /// carries a zero request count, tier configuration errors for tiered
    /// tables, and [`EngineError::ArithmeticOverflow`] if a token total or
    /// cost sum exceeds its representation.
    pub fn calculate(
        &self,
        usage: &UsageRecord,
        pricing: &PricingTable,
    ) -> Result<CostRecord, EngineError> {
        validate(usage, pricing)?;

        let components = match &pricing.pricing {
            PricingModel::PerToken {
                input_token_price,
                output_token_price,
                cached_input_token_price,
            } => per_token_components(
                usage,
                *input_token_price,
                *output_token_price,
                *cached_input_token_price,
            )?,
            PricingModel::PerRequest { request_price } => {
                per_request_components(usage, *request_price)?
            }
            PricingModel::Tiered { tiers } => tiered_components(usage, tiers, pricing)?,
        };

        let input_token_cost = quantize(components.input_token_cost);
        let output_token_cost = quantize(components.output_token_cost);
        let cached_input_token_cost = quantize(components.cached_input_token_cost);
        let request_cost = quantize(components.request_cost);

        // Total is the sum of the already-quantized components, so the
        // balance invariant holds exactly.
        let total_cost = input_token_cost
            .checked_add(output_token_cost)
            .and_then(|sum| sum.checked_add(cached_input_token_cost))
            .and_then(|sum| sum.checked_add(request_cost))
            .ok_or(EngineError::ArithmeticOverflow {
                context: "cost component sum",
            })?;
        let total_cost = quantize(total_cost);

        Ok(CostRecord {
            id: CostRecordId::new(),
            execution_id: usage.execution_id.clone(),
            agent_id: usage.agent_id.clone(),
            workflow_id: usage.workflow_id.clone(),
            tenant_id: usage.tenant_id.clone(),
            provider: usage.provider.clone(),
            model: usage.model.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_input_tokens: usage.cached_tokens(),
            request_count: usage.request_count,
            input_token_cost,
            output_token_cost,
            cached_input_token_cost,
            request_cost,
            total_cost,
            currency: pricing.currency,
            timestamp: usage.timestamp,
            calculated_at: self.clock.now(),
        })
    }

    /// Compute cost records for a batch of usage records against one
    /// shared pricing table.
    ///
    /// Element-wise: every record is validated against the same table, so
    /// a heterogeneous batch fails on its first mismatching record. The
    /// first error aborts the whole batch; an empty batch yields an empty
    /// vector.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CostCalculator::calculate`], surfaced for
    /// the first failing record.
    pub fn calculate_batch(
        &self,
        usages: &[UsageRecord],
        pricing: &PricingTable,
    ) -> Result<Vec<CostRecord>, EngineError> {
        usages
            .iter()
            .map(|usage| self.calculate(usage, pricing))
            .collect()
    }
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Validation and pricing arms
// ---------------------------------------------------------------------------

fn validate(usage: &UsageRecord, pricing: &PricingTable) -> Result<(), EngineError> {
    if usage.provider != pricing.provider {
        return Err(EngineError::ProviderMismatch {
            usage: usage.provider.clone(),
            pricing: pricing.provider.clone(),
        });
    }
    if usage.model != pricing.model {
        return Err(EngineError::ModelMismatch {
            usage: usage.model.clone(),
            pricing: pricing.model.clone(),
        });
    }
    // Token counts are unsigned, so the non-negativity requirement is
    // enforced by construction; a zero request count can still be built
    // programmatically and is rejected here.
    if usage.request_count == 0 {
        return Err(EngineError::ZeroRequestCount {
            execution_id: usage.execution_id.as_str().to_owned(),
        });
    }
    Ok(())
}

fn per_token_components(
    usage: &UsageRecord,
    input_token_price: Decimal,
    output_token_price: Decimal,
    cached_input_token_price: Option<Decimal>,
) -> Result<CostComponents, EngineError> {
    let input_token_cost =
        per_million_cost(usage.input_tokens, input_token_price, "input token cost")?;
    let output_token_cost =
        per_million_cost(usage.output_tokens, output_token_price, "output token cost")?;

    // Cached tokens cost something only when both a non-zero cached count
    // and a configured cached rate exist.
    let cached_input_token_cost = match (usage.cached_tokens(), cached_input_token_price) {
        (count, Some(rate)) if count > 0 => {
            per_million_cost(count, rate, "cached token cost")?
        }
        _ => Decimal::ZERO,
    };

    Ok(CostComponents {
        input_token_cost,
        output_token_cost,
        cached_input_token_cost,
        request_cost: Decimal::ZERO,
    })
}

fn per_request_components(
    usage: &UsageRecord,
    request_price: Decimal,
) -> Result<CostComponents, EngineError> {
    let request_cost = Decimal::from(usage.request_count)
        .checked_mul(request_price)
        .ok_or(EngineError::ArithmeticOverflow {
            context: "request cost",
        })?;

    Ok(CostComponents {
        input_token_cost: Decimal::ZERO,
        output_token_cost: Decimal::ZERO,
        cached_input_token_cost: Decimal::ZERO,
        request_cost,
    })
}

fn tiered_components(
    usage: &UsageRecord,
    tiers: &[PricingTier],
    pricing: &PricingTable,
) -> Result<CostComponents, EngineError> {
    if tiers.is_empty() {
        return Err(EngineError::NoTiersConfigured {
            provider: pricing.provider.clone(),
            model: pricing.model.clone(),
        });
    }

    let total_tokens = usage
        .input_tokens
        .checked_add(usage.output_tokens)
        .and_then(|sum| sum.checked_add(usage.cached_tokens()))
        .ok_or(EngineError::ArithmeticOverflow {
            context: "total token count",
        })?;

    // Tiers are considered in ascending min_tokens order regardless of
    // their configured order; the first containing tier wins.
    let mut ordered: Vec<&PricingTier> = tiers.iter().collect();
    ordered.sort_by_key(|tier| tier.min_tokens);

    let tier = ordered
        .iter()
        .find(|tier| tier.contains(total_tokens))
        .ok_or_else(|| EngineError::NoTierForTotal {
            total_tokens,
            provider: pricing.provider.clone(),
            model: pricing.model.clone(),
        })?;

    // The selected tier's single per-token price applies uniformly to
    // every token field.
    let input_token_cost =
        flat_token_cost(usage.input_tokens, tier.price_per_token, "input token cost")?;
    let output_token_cost =
        flat_token_cost(usage.output_tokens, tier.price_per_token, "output token cost")?;
    let cached_input_token_cost = flat_token_cost(
        usage.cached_tokens(),
        tier.price_per_token,
        "cached token cost",
    )?;

    Ok(CostComponents {
        input_token_cost,
        output_token_cost,
        cached_input_token_cost,
        request_cost: Decimal::ZERO,
    })
}

// ---------------------------------------------------------------------------
// Decimal helpers
// ---------------------------------------------------------------------------

/// `count × (rate / 1_000_000)` for per-million-token rates.
fn per_million_cost(
    count: u64,
    rate_per_million: Decimal,
    context: &'static str,
) -> Result<Decimal, EngineError> {
    Decimal::from(count)
        .checked_div(ONE_MILLION)
        .and_then(|scaled| scaled.checked_mul(rate_per_million))
        .ok_or(EngineError::ArithmeticOverflow { context })
}

/// `count × price` for per-single-token tier prices.
fn flat_token_cost(
    count: u64,
    price_per_token: Decimal,
    context: &'static str,
) -> Result<Decimal, EngineError> {
    Decimal::from(count)
        .checked_mul(price_per_token)
        .ok_or(EngineError::ArithmeticOverflow { context })
}

/// Pin a cost value to exactly [`MONEY_SCALE`] fractional digits.
///
/// `round_dp` trims excess precision (banker's rounding); `rescale` then
/// pads the scale back up so the canonical string form always shows ten
/// fractional digits.
fn quantize(value: Decimal) -> Decimal {
    let mut pinned = value.round_dp(MONEY_SCALE);
    pinned.rescale(MONEY_SCALE);
    pinned
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use costscope_types::Currency;

    use crate::clock::FixedClock;

    use super::*;

    fn usage() -> UsageRecord {
        UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 1000, 500)
    }

    fn per_token_pricing() -> PricingTable {
        PricingTable::new(
            "anthropic",
            "claude-3-opus",
            PricingModel::per_token(
                Decimal::new(1500, 2), // $15.00 per 1M input
                Decimal::new(7500, 2), // $75.00 per 1M output
            ),
            Currency::Usd,
        )
    }

    #[test]
    fn per_token_matches_published_rates() {
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&usage(), &per_token_pricing());

        assert!(result.is_ok());
        if let Ok(record) = result {
            // 1000 × (15.00 / 1M) = 0.015; 500 × (75.00 / 1M) = 0.0375
            assert_eq!(record.input_token_cost.to_string(), "0.0150000000");
            assert_eq!(record.output_token_cost.to_string(), "0.0375000000");
            assert_eq!(record.cached_input_token_cost.to_string(), "0.0000000000");
            assert_eq!(record.request_cost.to_string(), "0.0000000000");
            assert_eq!(record.total_cost.to_string(), "0.0525000000");
            assert_eq!(record.currency, Currency::Usd);
            assert!(record.components_balance());
        }
    }

    #[test]
    fn cached_tokens_bill_at_discounted_rate() {
        let pricing = PricingTable::new(
            "anthropic",
            "claude-3-opus",
            PricingModel::per_token_with_cache(
                Decimal::new(1500, 2),
                Decimal::new(7500, 2),
                Decimal::new(150, 2), // $1.50 per 1M cached
            ),
            Currency::Usd,
        );
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&usage().with_cached_tokens(200), &pricing);

        assert!(result.is_ok());
        if let Ok(record) = result {
            // 200 × (1.50 / 1M) = 0.0003
            assert_eq!(record.cached_input_token_cost.to_string(), "0.0003000000");
            assert_eq!(record.total_cost.to_string(), "0.0528000000");
        }
    }

    #[test]
    fn cached_tokens_without_cached_rate_cost_nothing() {
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&usage().with_cached_tokens(200), &per_token_pricing());

        assert!(result.is_ok());
        if let Ok(record) = result {
            assert_eq!(record.cached_input_token_cost, Decimal::ZERO);
            assert_eq!(record.cached_input_tokens, 200);
            assert_eq!(record.total_cost.to_string(), "0.0525000000");
        }
    }

    #[test]
    fn per_request_ignores_token_counts() {
        let pricing = PricingTable::new(
            "openai",
            "gpt-4o",
            PricingModel::per_request(Decimal::new(2, 3)), // $0.002 per request
            Currency::Usd,
        );
        let record = UsageRecord::new("exec-2", "ag1", "openai", "gpt-4o", 9999, 9999)
            .with_request_count(5);
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&record, &pricing);

        assert!(result.is_ok());
        if let Ok(record) = result {
            // 5 × 0.002 = 0.01
            assert_eq!(record.request_cost.to_string(), "0.0100000000");
            assert_eq!(record.input_token_cost.to_string(), "0.0000000000");
            assert_eq!(record.output_token_cost.to_string(), "0.0000000000");
            assert_eq!(record.total_cost.to_string(), "0.0100000000");
        }
    }

    #[test]
    fn tier_boundary_is_inclusive_on_max() {
        let pricing = PricingTable::new(
            "openai",
            "gpt-4o",
            PricingModel::tiered(vec![
                PricingTier::new(0, 1000, Decimal::new(1, 5)), // 0.00001 per token
                PricingTier::open_ended(1001, Decimal::new(5, 6)), // 0.000005 per token
            ]),
            Currency::Usd,
        );
        let calculator = CostCalculator::new();

        // 600 + 400 = 1000 total -> first tier.
        let at_boundary = UsageRecord::new("exec-3", "ag1", "openai", "gpt-4o", 600, 400);
        let result = calculator.calculate(&at_boundary, &pricing);
        assert!(result.is_ok());
        if let Ok(record) = result {
            // 600 × 0.00001 = 0.006; 400 × 0.00001 = 0.004
            assert_eq!(record.input_token_cost.to_string(), "0.0060000000");
            assert_eq!(record.output_token_cost.to_string(), "0.0040000000");
            assert_eq!(record.total_cost.to_string(), "0.0100000000");
        }

        // 600 + 401 = 1001 total -> second tier.
        let past_boundary = UsageRecord::new("exec-3", "ag1", "openai", "gpt-4o", 600, 401);
        let result = calculator.calculate(&past_boundary, &pricing);
        assert!(result.is_ok());
        if let Ok(record) = result {
            // 600 × 0.000005 = 0.003
            assert_eq!(record.input_token_cost.to_string(), "0.0030000000");
        }
    }

    #[test]
    fn unsorted_tiers_are_searched_in_ascending_order() {
        let pricing = PricingTable::new(
            "openai",
            "gpt-4o",
            PricingModel::tiered(vec![
                PricingTier::open_ended(1001, Decimal::new(5, 6)),
                PricingTier::new(0, 1000, Decimal::new(1, 5)),
            ]),
            Currency::Usd,
        );
        let record = UsageRecord::new("exec-4", "ag1", "openai", "gpt-4o", 500, 500);
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&record, &pricing);

        assert!(result.is_ok());
        if let Ok(record) = result {
            // First tier in ascending order covers 1000 tokens at 0.00001.
            assert_eq!(record.input_token_cost.to_string(), "0.0050000000");
        }
    }

    #[test]
    fn no_containing_tier_is_a_configuration_error() {
        let pricing = PricingTable::new(
            "openai",
            "gpt-4o",
            PricingModel::tiered(vec![PricingTier::new(0, 100, Decimal::new(1, 5))]),
            Currency::Usd,
        );
        let record = UsageRecord::new("exec-5", "ag1", "openai", "gpt-4o", 200, 0);
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&record, &pricing);

        assert!(matches!(
            result.err(),
            Some(EngineError::NoTierForTotal {
                total_tokens: 200,
                ..
            })
        ));
    }

    #[test]
    fn empty_tier_list_is_a_configuration_error() {
        let pricing = PricingTable::new(
            "openai",
            "gpt-4o",
            PricingModel::tiered(Vec::new()),
            Currency::Usd,
        );
        let record = UsageRecord::new("exec-6", "ag1", "openai", "gpt-4o", 1, 1);
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&record, &pricing);

        assert!(matches!(
            result.err(),
            Some(EngineError::NoTiersConfigured { .. })
        ));
    }

    #[test]
    fn provider_mismatch_rejected() {
        let calculator = CostCalculator::new();
        let record = UsageRecord::new("exec-7", "ag1", "openai", "claude-3-opus", 10, 10);
        let result = calculator.calculate(&record, &per_token_pricing());

        assert!(matches!(
            result.err(),
            Some(EngineError::ProviderMismatch { .. })
        ));
    }

    #[test]
    fn model_mismatch_rejected() {
        let calculator = CostCalculator::new();
        let record = UsageRecord::new("exec-8", "ag1", "anthropic", "claude-3-haiku", 10, 10);
        let result = calculator.calculate(&record, &per_token_pricing());

        assert!(matches!(
            result.err(),
            Some(EngineError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn zero_request_count_rejected() {
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&usage().with_request_count(0), &per_token_pricing());

        assert!(matches!(
            result.err(),
            Some(EngineError::ZeroRequestCount { .. })
        ));
    }

    #[test]
    fn batch_aborts_on_first_mismatching_record() {
        let calculator = CostCalculator::new();
        let records = vec![
            usage(),
            UsageRecord::new("exec-9", "ag1", "openai", "claude-3-opus", 10, 10),
            usage(),
        ];
        let result = calculator.calculate_batch(&records, &per_token_pricing());

        assert!(matches!(
            result.err(),
            Some(EngineError::ProviderMismatch { .. })
        ));
    }

    #[test]
    fn empty_batch_yields_no_records() {
        let calculator = CostCalculator::new();
        let result = calculator.calculate_batch(&[], &per_token_pricing());

        assert_eq!(result.ok().map(|records| records.len()), Some(0));
    }

    #[test]
    fn calculated_at_comes_from_the_injected_clock() {
        let instant = Utc::now();
        let calculator = CostCalculator::with_clock(Box::new(FixedClock::new(instant)));
        let result = calculator.calculate(&usage(), &per_token_pricing());

        assert_eq!(result.ok().map(|record| record.calculated_at), Some(instant));
    }

    #[test]
    fn zero_token_usage_costs_nothing() {
        let record = UsageRecord::new("exec-10", "ag1", "anthropic", "claude-3-opus", 0, 0);
        let calculator = CostCalculator::new();
        let result = calculator.calculate(&record, &per_token_pricing());

        assert!(result.is_ok());
        if let Ok(record) = result {
            assert_eq!(record.total_cost.to_string(), "0.0000000000");
            assert!(record.components_balance());
        }
    }
}
