//! Calculated cost records.
//!
//! A [`CostRecord`] is the engine's output for one usage record: the four
//! cost components and their exact total, each carried at scale 10 (ten
//! fractional digits) so canonical serialization is stable across runs
//! and summation order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{AgentId, CostRecordId, ExecutionId, TenantId, WorkflowId};
use crate::enums::Currency;

/// The number of fractional digits every monetary component carries.
pub const MONEY_SCALE: u32 = 10;

/// Calculated cost for one usage record.
///
/// Identity fields and token counts are carried through from the source
/// usage unchanged. Invariant: `total_cost` equals the exact sum of the
/// four components, all at scale 10.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CostRecord {
    /// Engine-minted identifier for this record.
    pub id: CostRecordId,

    /// The execution the source usage belongs to.
    pub execution_id: ExecutionId,

    /// The agent that issued the usage.
    pub agent_id: AgentId,

    /// The workflow the execution ran inside, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,

    /// The tenant that owns the usage, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    /// Provider the usage was billed against.
    pub provider: String,

    /// Model the usage was billed against.
    pub model: String,

    /// Input tokens the cost covers.
    pub input_tokens: u64,

    /// Output tokens the cost covers.
    pub output_tokens: u64,

    /// Cached input tokens the cost covers (absent count carried as 0).
    pub cached_input_tokens: u64,

    /// Requests the cost covers (per-request pricing only).
    pub request_count: u32,

    /// Cost of the input tokens, scale 10.
    #[ts(as = "String")]
    pub input_token_cost: Decimal,

    /// Cost of the output tokens, scale 10.
    #[ts(as = "String")]
    pub output_token_cost: Decimal,

    /// Cost of the cached input tokens, scale 10. Zero unless the pricing
    /// table configures a cached rate and the usage carried cached tokens.
    #[ts(as = "String")]
    pub cached_input_token_cost: Decimal,

    /// Request-count cost, scale 10. Zero outside per-request pricing.
    #[ts(as = "String")]
    pub request_cost: Decimal,

    /// Exact sum of the four components, scale 10.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Currency of the pricing table the cost was calculated against.
    pub currency: Currency,

    /// When the usage occurred.
    pub timestamp: DateTime<Utc>,

    /// When the cost was calculated (engine clock read).
    pub calculated_at: DateTime<Utc>,
}

impl CostRecord {
    /// Total tokens across input, output, and cached counts.
    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cached_input_tokens)
    }

    /// Whether the component invariant holds: the four components sum
    /// exactly to `total_cost`.
    pub fn components_balance(&self) -> bool {
        let sum = self
            .input_token_cost
            .checked_add(self.output_token_cost)
            .and_then(|s| s.checked_add(self.cached_input_token_cost))
            .and_then(|s| s.checked_add(self.request_cost));
        sum == Some(self.total_cost)
    }
}
