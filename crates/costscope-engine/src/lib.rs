//! Cost engine for LLM usage: normalization, calculation, attribution.
//!
//! The engine turns raw per-call token usage into exact, attributable
//! cost. Money is [`rust_decimal::Decimal`] end to end; binary floating
//! point never touches a price or a total.
//!
//! # Architecture
//!
//! - [`normalizer`] -- restates provider token counts on a common
//!   tokenizer baseline.
//! - [`calculator`] -- prices usage against a pricing table (per-token,
//!   per-request, or tiered) at fixed 10-decimal money scale.
//! - [`attributor`] -- groups cost records into execution, agent,
//!   workflow, and tenant views and rolls them into summaries.
//! - [`reconcile`] -- verifies that attribution never created or
//!   destroyed cost.
//! - [`pipeline`] -- sequences the above over one usage batch.
//! - [`settings`] -- YAML configuration for the pipeline and normalizer.
//! - [`currency`] -- exchange-rate conversion over caller-supplied rates.
//! - [`clock`] -- injectable time source for deterministic tests.
//!
//! Pure computation stays silent; the pipeline is the only module that
//! emits `tracing` events.
//!
//! # Usage
//!
//! ```
//! use costscope_engine::CostCalculator;
//! use costscope_types::{Currency, PricingModel, PricingTable, UsageRecord};
//! use rust_decimal::Decimal;
//!
//! let usage = UsageRecord::new(
//!     "exec-1",
//!     "billing-agent",
//!     "anthropic",
//!     "claude-3-opus",
//!     1000,
//!     500,
//! );
//! let pricing = PricingTable::new(
//!     "anthropic",
//!     "claude-3-opus",
//!     PricingModel::per_token(Decimal::new(1500, 2), Decimal::new(7500, 2)),
//!     Currency::Usd,
//! );
//!
//! let calculator = CostCalculator::new();
//! let record = calculator.calculate(&usage, &pricing).ok();
//! assert_eq!(
//!     record.map(|r| r.total_cost.to_string()),
//!     Some("0.0525000000".to_owned())
//! );
//! ```

pub mod attributor;
pub mod calculator;
pub mod clock;
pub mod currency;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod reconcile;
pub mod settings;

// Re-export primary types at crate root.
pub use attributor::CostAttributor;
pub use calculator::CostCalculator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EngineError, ErrorKind};
pub use normalizer::{
    FactorVariance, NormalizationReport, ProviderTokenTotals, TokenCountingConfig, TokenNormalizer,
};
pub use pipeline::{CostPipeline, PipelineOutcome};
pub use reconcile::{ReconciliationDrift, ReconciliationResult};
pub use settings::{
    EngineSettings, NormalizationSettings, PipelineSettings, SettingsError, CONFIG_ENV_VAR,
};
