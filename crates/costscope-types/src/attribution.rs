//! Scoped cost attributions and the cross-scope summary.
//!
//! An attribution aggregates cost records at one organizational scope.
//! The four concrete shapes share a common core (total cost, currency,
//! record count, time range) and add scope-specific identity and nested
//! breakdowns. [`Attribution`] is the tagged union over the four shapes:
//! every variant declares exactly which breakdown maps it carries, and
//! summary generation pattern-matches instead of probing for fields.
//!
//! | Variant | Identity | Breakdowns |
//! |---------|----------|------------|
//! | [`ExecutionAttribution`] | execution (+ carried agent/workflow/tenant) | provider |
//! | [`AgentAttribution`] | agent | provider, model |
//! | [`WorkflowAttribution`] | workflow | agent, provider |
//! | [`TenantAttribution`] | tenant | workflow, agent, provider |
//!
//! Breakdown maps are [`BTreeMap`]s so iteration order, and therefore
//! serialized output, is deterministic.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Currency, ScopeType};
use crate::ids::{AgentId, ExecutionId, TenantId, WorkflowId};

// ---------------------------------------------------------------------------
// Breakdown entries
// ---------------------------------------------------------------------------

/// One slice of a breakdown map: the cost, token volume, and record count
/// attributed to a single key (provider, model, or agent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ScopeBreakdown {
    /// Exact cost attributed to this key.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Token volume attributed to this key.
    pub total_tokens: u64,

    /// Number of cost records attributed to this key.
    pub record_count: u64,
}

/// One workflow's slice inside a tenant attribution.
///
/// Extends [`ScopeBreakdown`] with the distinct-agent count computed from
/// that workflow's records specifically, not the tenant total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorkflowBreakdown {
    /// Exact cost attributed to this workflow.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Token volume attributed to this workflow.
    pub total_tokens: u64,

    /// Number of cost records attributed to this workflow.
    pub record_count: u64,

    /// Distinct agents appearing in this workflow's records.
    pub agent_count: u64,
}

// ---------------------------------------------------------------------------
// Execution scope
// ---------------------------------------------------------------------------

/// Aggregated cost for one execution.
///
/// Carries the full identity chain observed on the execution's records
/// (first-seen values within the group), so summaries can count distinct
/// agents, workflows, and tenants across execution attributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ExecutionAttribution {
    /// The execution all constituent records belong to.
    pub execution_id: ExecutionId,

    /// The agent that ran the execution (first seen in the group).
    pub agent_id: AgentId,

    /// The workflow the execution ran inside, if any record carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,

    /// The owning tenant, if any record carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    /// Exact sum of constituent record costs.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Currency shared by every constituent record.
    pub currency: Currency,

    /// Number of constituent records.
    pub record_count: u64,

    /// Summed input tokens across constituent records.
    pub input_tokens: u64,

    /// Summed output tokens across constituent records.
    pub output_tokens: u64,

    /// Summed cached input tokens across constituent records.
    pub cached_input_tokens: u64,

    /// Earliest constituent record timestamp.
    pub start_time: DateTime<Utc>,

    /// Latest constituent record timestamp.
    pub end_time: DateTime<Utc>,

    /// Cost/token/record totals per provider.
    pub provider_breakdown: BTreeMap<String, ScopeBreakdown>,
}

// ---------------------------------------------------------------------------
// Agent scope
// ---------------------------------------------------------------------------

/// Aggregated cost for one agent across all its executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AgentAttribution {
    /// The agent all constituent records belong to.
    pub agent_id: AgentId,

    /// Exact sum of constituent record costs.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Currency shared by every constituent record.
    pub currency: Currency,

    /// Number of constituent records.
    pub record_count: u64,

    /// Distinct executions the agent's records span.
    pub execution_count: u64,

    /// Earliest constituent record timestamp.
    pub start_time: DateTime<Utc>,

    /// Latest constituent record timestamp.
    pub end_time: DateTime<Utc>,

    /// Cost/token/record totals per provider.
    pub provider_breakdown: BTreeMap<String, ScopeBreakdown>,

    /// Cost/token/record totals per model.
    pub model_breakdown: BTreeMap<String, ScopeBreakdown>,
}

// ---------------------------------------------------------------------------
// Workflow scope
// ---------------------------------------------------------------------------

/// Aggregated cost for one workflow.
///
/// Records without a workflow ID are excluded from this view entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorkflowAttribution {
    /// The workflow all constituent records belong to.
    pub workflow_id: WorkflowId,

    /// Exact sum of constituent record costs.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Currency shared by every constituent record.
    pub currency: Currency,

    /// Number of constituent records.
    pub record_count: u64,

    /// Distinct agents appearing in the workflow's records.
    pub agent_count: u64,

    /// Distinct executions the workflow's records span.
    pub execution_count: u64,

    /// Earliest constituent record timestamp.
    pub start_time: DateTime<Utc>,

    /// Latest constituent record timestamp.
    pub end_time: DateTime<Utc>,

    /// Cost/token/record totals per agent.
    pub agent_breakdown: BTreeMap<AgentId, ScopeBreakdown>,

    /// Cost/token/record totals per provider.
    pub provider_breakdown: BTreeMap<String, ScopeBreakdown>,
}

// ---------------------------------------------------------------------------
// Tenant scope
// ---------------------------------------------------------------------------

/// Aggregated cost for one tenant.
///
/// Records without a tenant ID are excluded from this view entirely.
/// Records with a tenant but no workflow count toward the tenant totals
/// but not toward the workflow breakdown or the distinct-workflow count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TenantAttribution {
    /// The tenant all constituent records belong to.
    pub tenant_id: TenantId,

    /// Exact sum of constituent record costs.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Currency shared by every constituent record.
    pub currency: Currency,

    /// Number of constituent records.
    pub record_count: u64,

    /// Distinct workflows appearing in the tenant's records.
    pub workflow_count: u64,

    /// Distinct agents appearing in the tenant's records.
    pub agent_count: u64,

    /// Distinct executions the tenant's records span.
    pub execution_count: u64,

    /// Earliest constituent record timestamp.
    pub start_time: DateTime<Utc>,

    /// Latest constituent record timestamp.
    pub end_time: DateTime<Utc>,

    /// Per-workflow totals, including each workflow's own distinct-agent
    /// count.
    pub workflow_breakdown: BTreeMap<WorkflowId, WorkflowBreakdown>,

    /// Cost/token/record totals per agent.
    pub agent_breakdown: BTreeMap<AgentId, ScopeBreakdown>,

    /// Cost/token/record totals per provider.
    pub provider_breakdown: BTreeMap<String, ScopeBreakdown>,
}

// ---------------------------------------------------------------------------
// Tagged union
// ---------------------------------------------------------------------------

/// An attribution at any of the four scopes.
///
/// Tagged on the wire as `"scopeType": "execution" | "agent" | "workflow"
/// | "tenant"`. Consumers pattern-match; there is no structural probing
/// for breakdown fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "scopeType", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Attribution {
    /// Execution-scope attribution.
    Execution(ExecutionAttribution),
    /// Agent-scope attribution.
    Agent(AgentAttribution),
    /// Workflow-scope attribution.
    Workflow(WorkflowAttribution),
    /// Tenant-scope attribution.
    Tenant(TenantAttribution),
}

impl Attribution {
    /// The scope this attribution aggregates over.
    pub const fn scope_type(&self) -> ScopeType {
        match self {
            Self::Execution(_) => ScopeType::Execution,
            Self::Agent(_) => ScopeType::Agent,
            Self::Workflow(_) => ScopeType::Workflow,
            Self::Tenant(_) => ScopeType::Tenant,
        }
    }

    /// The scope identity as a string slice.
    pub fn scope_id(&self) -> &str {
        match self {
            Self::Execution(a) => a.execution_id.as_str(),
            Self::Agent(a) => a.agent_id.as_str(),
            Self::Workflow(a) => a.workflow_id.as_str(),
            Self::Tenant(a) => a.tenant_id.as_str(),
        }
    }

    /// Exact sum of constituent record costs.
    pub const fn total_cost(&self) -> Decimal {
        match self {
            Self::Execution(a) => a.total_cost,
            Self::Agent(a) => a.total_cost,
            Self::Workflow(a) => a.total_cost,
            Self::Tenant(a) => a.total_cost,
        }
    }

    /// Currency shared by every constituent record.
    pub const fn currency(&self) -> Currency {
        match self {
            Self::Execution(a) => a.currency,
            Self::Agent(a) => a.currency,
            Self::Workflow(a) => a.currency,
            Self::Tenant(a) => a.currency,
        }
    }

    /// Number of constituent records.
    pub const fn record_count(&self) -> u64 {
        match self {
            Self::Execution(a) => a.record_count,
            Self::Agent(a) => a.record_count,
            Self::Workflow(a) => a.record_count,
            Self::Tenant(a) => a.record_count,
        }
    }

    /// Earliest constituent record timestamp.
    pub const fn start_time(&self) -> DateTime<Utc> {
        match self {
            Self::Execution(a) => a.start_time,
            Self::Agent(a) => a.start_time,
            Self::Workflow(a) => a.start_time,
            Self::Tenant(a) => a.start_time,
        }
    }

    /// Latest constituent record timestamp.
    pub const fn end_time(&self) -> DateTime<Utc> {
        match self {
            Self::Execution(a) => a.end_time,
            Self::Agent(a) => a.end_time,
            Self::Workflow(a) => a.end_time,
            Self::Tenant(a) => a.end_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// One entry in a top-cost ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CostRanking {
    /// The ranked entity's identifier.
    pub id: String,

    /// Exact cost attributed to the entity.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Token volume attributed to the entity.
    pub total_tokens: u64,

    /// Number of cost records attributed to the entity.
    pub record_count: u64,
}

/// Cross-scope rollup over an arbitrary set of attributions.
///
/// Entity counts are counts of distinct IDs seen across the attributions
/// passed in: callers should pass a non-overlapping partition, and
/// duplicated IDs de-duplicate rather than double count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AttributionSummary {
    /// Exact sum of all attribution costs.
    #[ts(as = "String")]
    pub total_cost: Decimal,

    /// Currency shared by every input attribution.
    pub currency: Currency,

    /// Sum of record counts across input attributions.
    pub record_count: u64,

    /// Distinct executions seen across input attributions.
    pub execution_count: u64,

    /// Distinct agents seen across input attributions.
    pub agent_count: u64,

    /// Distinct workflows seen across input attributions.
    pub workflow_count: u64,

    /// Distinct tenants seen across input attributions.
    pub tenant_count: u64,

    /// Earliest start time across input attributions.
    pub start_time: DateTime<Utc>,

    /// Latest end time across input attributions.
    pub end_time: DateTime<Utc>,

    /// Provider totals merged (by summing) across all input attributions.
    pub provider_breakdown: BTreeMap<String, ScopeBreakdown>,

    /// Model totals merged across agent attributions (the only variant
    /// carrying a model breakdown).
    pub model_breakdown: BTreeMap<String, ScopeBreakdown>,

    /// Up to ten highest-cost agents, descending by cost, merged from
    /// workflow and tenant agent breakdowns.
    pub top_agents: Vec<CostRanking>,

    /// Up to ten highest-cost workflows, descending by cost, merged from
    /// tenant workflow breakdowns.
    pub top_workflows: Vec<CostRanking>,

    /// When the summary was generated (engine clock read).
    pub generated_at: DateTime<Utc>,
}
