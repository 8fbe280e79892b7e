//! Pricing tables and pricing strategies.
//!
//! A [`PricingTable`] is one provider/model's cost rule, resolved by the
//! caller before calculation; the engine never looks pricing up itself.
//! The strategy is a tagged sum type ([`PricingModel`]) so each strategy
//! declares exactly the fields it needs -- a per-token table without an
//! input price is unrepresentable rather than a runtime error.
//!
//! All prices are [`Decimal`] and serialize as decimal strings; binary
//! floating point never touches money.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Currency;

// ---------------------------------------------------------------------------
// Pricing Table
// ---------------------------------------------------------------------------

/// One provider/model's cost rule, valid from `effective_date`.
///
/// Supplied by the caller per calculation call; the engine never persists
/// or caches pricing tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PricingTable {
    /// Provider this table prices, e.g. `"anthropic"`.
    pub provider: String,

    /// Model this table prices.
    pub model: String,

    /// The pricing strategy and its parameters.
    pub pricing: PricingModel,

    /// Currency every price in this table is denominated in.
    pub currency: Currency,

    /// When this pricing becomes effective.
    pub effective_date: DateTime<Utc>,
}

impl PricingTable {
    /// Create a pricing table effective from the current wall-clock time.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        pricing: PricingModel,
        currency: Currency,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            pricing,
            currency,
            effective_date: Utc::now(),
        }
    }

    /// Set the effective date.
    #[must_use]
    pub const fn with_effective_date(mut self, effective_date: DateTime<Utc>) -> Self {
        self.effective_date = effective_date;
        self
    }
}

// ---------------------------------------------------------------------------
// Pricing Model
// ---------------------------------------------------------------------------

/// The pricing strategy for a provider/model.
///
/// Tagged on the wire as `"type": "PER_TOKEN" | "PER_REQUEST" | "TIERED"`.
/// Each variant carries exactly the fields that strategy requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum PricingModel {
    /// Linear pricing per million tokens, the common case.
    #[serde(rename_all = "camelCase")]
    PerToken {
        /// Price per one million input tokens.
        #[ts(as = "String")]
        input_token_price: Decimal,

        /// Price per one million output tokens.
        #[ts(as = "String")]
        output_token_price: Decimal,

        /// Discounted price per one million cached input tokens. When
        /// absent, cached tokens cost nothing extra.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(as = "Option<String>")]
        cached_input_token_price: Option<Decimal>,
    },

    /// Flat pricing per request, regardless of token volume.
    #[serde(rename_all = "camelCase")]
    PerRequest {
        /// Price per single request.
        #[ts(as = "String")]
        request_price: Decimal,
    },

    /// Volume-tiered pricing: the record's total token count selects one
    /// tier, whose per-token price applies uniformly to every token.
    #[serde(rename_all = "camelCase")]
    Tiered {
        /// Tiers in ascending `min_tokens` order. Ranges must not
        /// overlap; the engine does not validate this (first containing
        /// tier wins).
        tiers: Vec<PricingTier>,
    },
}

impl PricingModel {
    /// Per-token pricing without a cached-token discount.
    pub const fn per_token(input_token_price: Decimal, output_token_price: Decimal) -> Self {
        Self::PerToken {
            input_token_price,
            output_token_price,
            cached_input_token_price: None,
        }
    }

    /// Per-token pricing with a discounted cached-input rate.
    pub const fn per_token_with_cache(
        input_token_price: Decimal,
        output_token_price: Decimal,
        cached_input_token_price: Decimal,
    ) -> Self {
        Self::PerToken {
            input_token_price,
            output_token_price,
            cached_input_token_price: Some(cached_input_token_price),
        }
    }

    /// Flat per-request pricing.
    pub const fn per_request(request_price: Decimal) -> Self {
        Self::PerRequest { request_price }
    }

    /// Tiered pricing over the given tiers.
    pub const fn tiered(tiers: Vec<PricingTier>) -> Self {
        Self::Tiered { tiers }
    }
}

// ---------------------------------------------------------------------------
// Pricing Tier
// ---------------------------------------------------------------------------

/// A token-volume range with its own flat per-token price.
///
/// Unlike [`PricingModel::PerToken`] prices, `price_per_token` is the
/// price of a single token, not a million.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PricingTier {
    /// Inclusive lower bound of the range, in total tokens.
    pub min_tokens: u64,

    /// Inclusive upper bound of the range; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,

    /// Price of one token inside this range.
    #[ts(as = "String")]
    pub price_per_token: Decimal,
}

impl PricingTier {
    /// Create a bounded tier covering `[min_tokens, max_tokens]`.
    pub const fn new(min_tokens: u64, max_tokens: u64, price_per_token: Decimal) -> Self {
        Self {
            min_tokens,
            max_tokens: Some(max_tokens),
            price_per_token,
        }
    }

    /// Create an unbounded tier covering `[min_tokens, ∞)`.
    pub const fn open_ended(min_tokens: u64, price_per_token: Decimal) -> Self {
        Self {
            min_tokens,
            max_tokens: None,
            price_per_token,
        }
    }

    /// Whether the given total token count falls inside this tier.
    pub fn contains(&self, total_tokens: u64) -> bool {
        total_tokens >= self.min_tokens
            && self.max_tokens.is_none_or(|max| total_tokens <= max)
    }
}
