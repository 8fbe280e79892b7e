//! Raw and normalized usage records.
//!
//! A [`UsageRecord`] is one LLM call's raw token usage as reported by the
//! provider, tagged with the identity chain (execution, agent, optional
//! workflow and tenant) that cost attribution groups by. Records are
//! constructed at the ingestion boundary and are immutable afterwards.
//!
//! A [`NormalizedUsage`] wraps a record together with token counts restated
//! on the common tokenizer baseline, as produced by the token normalizer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::NormalizationMethod;
use crate::ids::{AgentId, ExecutionId, TenantId, WorkflowId};

// ---------------------------------------------------------------------------
// Usage Record
// ---------------------------------------------------------------------------

/// One LLM call's raw usage.
///
/// Token counts are unsigned by construction, so negative counts are
/// unrepresentable. `request_count >= 1` is validated at calculation time
/// (per-request pricing is the only consumer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct UsageRecord {
    /// The execution this usage belongs to. Groups the line items of one
    /// top-level call.
    pub execution_id: ExecutionId,

    /// The agent that issued the call.
    pub agent_id: AgentId,

    /// The workflow the execution ran inside, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,

    /// The tenant that owns the usage, if known at ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    /// Provider name, e.g. `"openai"` or `"anthropic"`.
    pub provider: String,

    /// Model identifier as reported by the provider.
    pub model: String,

    /// Prompt tokens consumed.
    pub input_tokens: u64,

    /// Completion tokens produced.
    pub output_tokens: u64,

    /// Input tokens served from the provider-side prompt cache, if the
    /// provider reports them. Cached tokens are billed at a discounted
    /// rate when the pricing table configures one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u64>,

    /// Number of requests this record covers. Only per-request pricing
    /// reads it; defaults to 1.
    #[serde(default = "default_request_count")]
    pub request_count: u32,

    /// When the usage occurred (provider-side), as opposed to when its
    /// cost was calculated.
    pub timestamp: DateTime<Utc>,

    /// Free-form metadata carried through from ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

const fn default_request_count() -> u32 {
    1
}

impl UsageRecord {
    /// Create a usage record with the required fields; the timestamp is
    /// set to the current wall-clock time. Optional fields are set via
    /// the `with_*` helpers.
    pub fn new(
        execution_id: impl Into<ExecutionId>,
        agent_id: impl Into<AgentId>,
        provider: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            agent_id: agent_id.into(),
            workflow_id: None,
            tenant_id: None,
            provider: provider.into(),
            model: model.into(),
            input_tokens,
            output_tokens,
            cached_input_tokens: None,
            request_count: default_request_count(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Set the workflow this execution ran inside.
    #[must_use]
    pub fn with_workflow(mut self, workflow_id: impl Into<WorkflowId>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Set the owning tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the cached input token count.
    #[must_use]
    pub const fn with_cached_tokens(mut self, cached_input_tokens: u64) -> Self {
        self.cached_input_tokens = Some(cached_input_tokens);
        self
    }

    /// Set the request count (per-request pricing).
    #[must_use]
    pub const fn with_request_count(mut self, request_count: u32) -> Self {
        self.request_count = request_count;
        self
    }

    /// Set the usage occurrence timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Cached input tokens, treating an absent count as zero.
    pub fn cached_tokens(&self) -> u64 {
        self.cached_input_tokens.unwrap_or(0)
    }

    /// Total tokens across input, output, and cached counts.
    ///
    /// Clamps at `u64::MAX` via saturating addition; real token counts
    /// never approach that range.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cached_tokens())
    }
}

// ---------------------------------------------------------------------------
// Normalized Usage
// ---------------------------------------------------------------------------

/// A usage record together with its token counts restated on the common
/// tokenizer baseline.
///
/// Produced by the token normalizer. The original record is carried
/// unchanged; `to_usage` substitutes the normalized counts when the
/// pipeline feeds normalized usage into cost calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NormalizedUsage {
    /// The original record, unchanged.
    pub record: UsageRecord,

    /// Input tokens on the common baseline.
    pub normalized_input_tokens: u64,

    /// Output tokens on the common baseline.
    pub normalized_output_tokens: u64,

    /// Cached input tokens on the common baseline; `None` when the
    /// original record carried no cached count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_cached_tokens: Option<u64>,

    /// Sum of normalized input, output, and cached tokens.
    pub total_normalized_tokens: u64,

    /// The multiplier relating raw counts to normalized counts: the mean
    /// of the per-field factors (factor method), `chars_per_token / 4.0`
    /// (character estimate), or exactly 1 (raw passthrough).
    #[ts(as = "String")]
    pub normalization_factor: Decimal,

    /// The strategy that produced the normalized counts.
    pub normalization_method: NormalizationMethod,
}

impl NormalizedUsage {
    /// Produce a usage record with the normalized counts substituted for
    /// the raw ones. Identity fields, pricing inputs, and timestamps are
    /// carried through unchanged.
    pub fn to_usage(&self) -> UsageRecord {
        let mut usage = self.record.clone();
        usage.input_tokens = self.normalized_input_tokens;
        usage.output_tokens = self.normalized_output_tokens;
        usage.cached_input_tokens = self.normalized_cached_tokens;
        usage
    }
}
