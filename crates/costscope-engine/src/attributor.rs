//! Cost attribution across the four organizational scopes.
//!
//! Attribution groups cost records into scoped views (execution, agent,
//! workflow, tenant), each carrying exact cost totals and nested
//! breakdowns, plus a cross-scope summary with top-cost rankings. All four
//! grouping operations share one algorithm: a single pass over the input,
//! one running checked decimal sum per group, saturating integer counters
//! per breakdown key, and running min/max timestamps.
//!
//! # Consistency rules
//!
//! - A group's `total_cost` is the exact sum of its records' totals; no
//!   intermediate rounding.
//! - Currency never mixes: a record whose currency differs from its
//!   group's is rejected, and a summary input whose currency differs from
//!   the first attribution's is rejected.
//! - Workflow and tenant views silently exclude records missing the
//!   respective ID; that is filtering, not an error.
//! - Output vectors are ordered by group key, a side effect of the
//!   `BTreeMap` accumulators. Callers get determinism but should not rely
//!   on any particular order.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use costscope_types::{
    AgentAttribution, AgentId, Attribution, AttributionSummary, CostRanking, CostRecord, Currency,
    ExecutionAttribution, ExecutionId, ScopeBreakdown, ScopeType, TenantAttribution, TenantId,
    WorkflowAttribution, WorkflowBreakdown, WorkflowId,
};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;

/// Maximum entries in the summary's top-cost rankings.
const TOP_RANKINGS: usize = 10;

/// Groups cost records into scoped attribution views.
///
/// The grouping operations are pure associated functions; the struct
/// itself only carries the clock that stamps generated summaries.
#[derive(Debug)]
pub struct CostAttributor {
    /// Source of `generated_at` timestamps.
    clock: Box<dyn Clock>,
}

impl CostAttributor {
    /// Create an attributor stamping summaries with the system clock.
    pub fn new() -> Self {
        Self {
            clock: Box::new(SystemClock),
        }
    }

    /// Create an attributor with an injected clock.
    pub const fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Group records by execution.
    ///
    /// Each group carries summed token counts, a per-provider breakdown,
    /// and the identity chain (agent, workflow, tenant) observed on its
    /// records, so summaries can count distinct entities across execution
    /// attributions. Identity fields take the first value observed within
    /// the group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CurrencyMismatch`] when a group's records
    /// disagree on currency and [`EngineError::ArithmeticOverflow`] if a
    /// cost sum leaves the decimal range.
    pub fn attribute_by_execution(
        records: &[CostRecord],
    ) -> Result<Vec<ExecutionAttribution>, EngineError> {
        let mut groups: BTreeMap<ExecutionId, ExecutionGroup> = BTreeMap::new();

        for record in records {
            match groups.entry(record.execution_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(ExecutionGroup::seed(record)?);
                }
                Entry::Occupied(mut slot) => {
                    slot.get_mut().absorb(record)?;
                }
            }
        }

        Ok(groups
            .into_iter()
            .map(|(execution_id, group)| group.finish(execution_id))
            .collect())
    }

    /// Group records by agent, across all of the agent's executions.
    ///
    /// Adds per-provider and per-model breakdowns and a distinct-execution
    /// count.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CostAttributor::attribute_by_execution`].
    pub fn attribute_by_agent(
        records: &[CostRecord],
    ) -> Result<Vec<AgentAttribution>, EngineError> {
        let mut groups: BTreeMap<AgentId, AgentGroup> = BTreeMap::new();

        for record in records {
            match groups.entry(record.agent_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(AgentGroup::seed(record)?);
                }
                Entry::Occupied(mut slot) => {
                    slot.get_mut().absorb(record)?;
                }
            }
        }

        Ok(groups
            .into_iter()
            .map(|(agent_id, group)| group.finish(agent_id))
            .collect())
    }

    /// Group records by workflow, excluding records that carry none.
    ///
    /// Adds per-agent and per-provider breakdowns and distinct agent and
    /// execution counts.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CostAttributor::attribute_by_execution`].
    pub fn attribute_by_workflow(
        records: &[CostRecord],
    ) -> Result<Vec<WorkflowAttribution>, EngineError> {
        let mut groups: BTreeMap<WorkflowId, WorkflowGroup> = BTreeMap::new();

        for record in records {
            let Some(workflow_id) = &record.workflow_id else {
                continue;
            };
            match groups.entry(workflow_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(WorkflowGroup::seed(record)?);
                }
                Entry::Occupied(mut slot) => {
                    slot.get_mut().absorb(record)?;
                }
            }
        }

        Ok(groups
            .into_iter()
            .map(|(workflow_id, group)| group.finish(workflow_id))
            .collect())
    }

    /// Group records by tenant, excluding records that carry none.
    ///
    /// Adds per-workflow, per-agent, and per-provider breakdowns and
    /// distinct workflow, agent, and execution counts. Each workflow
    /// slice's `agent_count` comes from that workflow's records
    /// specifically; records with a tenant but no workflow count toward
    /// the tenant totals only.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CostAttributor::attribute_by_execution`].
    pub fn attribute_by_tenant(
        records: &[CostRecord],
    ) -> Result<Vec<TenantAttribution>, EngineError> {
        let mut groups: BTreeMap<TenantId, TenantGroup> = BTreeMap::new();

        for record in records {
            let Some(tenant_id) = &record.tenant_id else {
                continue;
            };
            match groups.entry(tenant_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(TenantGroup::seed(record)?);
                }
                Entry::Occupied(mut slot) => {
                    slot.get_mut().absorb(record)?;
                }
            }
        }

        Ok(groups
            .into_iter()
            .map(|(tenant_id, group)| group.finish(tenant_id))
            .collect())
    }

    /// Roll up an arbitrary set of attributions into one summary.
    ///
    /// Entity counts are distinct-ID counts across everything passed in;
    /// execution attributions contribute their whole identity chain, the
    /// other variants contribute their own scope ID. Provider maps merge
    /// from every variant, model maps from agent attributions, and the
    /// top-cost rankings merge agent breakdowns (workflow and tenant
    /// views) and workflow breakdowns (tenant views).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptySummaryInput`] for an empty slice,
    /// [`EngineError::CurrencyMismatch`] when attributions disagree on
    /// currency, and [`EngineError::ArithmeticOverflow`] if a sum leaves
    /// the decimal range.
    pub fn generate_summary(
        &self,
        attributions: &[Attribution],
    ) -> Result<AttributionSummary, EngineError> {
        let Some(first) = attributions.first() else {
            return Err(EngineError::EmptySummaryInput);
        };

        let currency = first.currency();
        let mut total_cost = Decimal::ZERO;
        let mut record_count = 0u64;
        let mut start_time = first.start_time();
        let mut end_time = first.end_time();

        let mut executions: BTreeSet<&str> = BTreeSet::new();
        let mut agents: BTreeSet<&str> = BTreeSet::new();
        let mut workflows: BTreeSet<&str> = BTreeSet::new();
        let mut tenants: BTreeSet<&str> = BTreeSet::new();

        let mut provider_breakdown: BTreeMap<String, ScopeBreakdown> = BTreeMap::new();
        let mut model_breakdown: BTreeMap<String, ScopeBreakdown> = BTreeMap::new();
        let mut agent_costs: BTreeMap<String, ScopeBreakdown> = BTreeMap::new();
        let mut workflow_costs: BTreeMap<String, ScopeBreakdown> = BTreeMap::new();

        for attribution in attributions {
            if attribution.currency() != currency {
                return Err(EngineError::CurrencyMismatch {
                    scope: attribution.scope_type(),
                    expected: currency,
                    found: attribution.currency(),
                });
            }

            total_cost = total_cost
                .checked_add(attribution.total_cost())
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "summary cost sum",
                })?;
            record_count = record_count.saturating_add(attribution.record_count());
            start_time = start_time.min(attribution.start_time());
            end_time = end_time.max(attribution.end_time());

            match attribution {
                Attribution::Execution(a) => {
                    executions.insert(a.execution_id.as_str());
                    agents.insert(a.agent_id.as_str());
                    if let Some(workflow_id) = &a.workflow_id {
                        workflows.insert(workflow_id.as_str());
                    }
                    if let Some(tenant_id) = &a.tenant_id {
                        tenants.insert(tenant_id.as_str());
                    }
                    merge_breakdowns(&mut provider_breakdown, &a.provider_breakdown)?;
                }
                Attribution::Agent(a) => {
                    agents.insert(a.agent_id.as_str());
                    merge_breakdowns(&mut provider_breakdown, &a.provider_breakdown)?;
                    merge_breakdowns(&mut model_breakdown, &a.model_breakdown)?;
                }
                Attribution::Workflow(a) => {
                    workflows.insert(a.workflow_id.as_str());
                    merge_breakdowns(&mut provider_breakdown, &a.provider_breakdown)?;
                    for (agent_id, slice) in &a.agent_breakdown {
                        merge_slice(
                            agent_costs.entry(agent_id.as_str().to_owned()).or_default(),
                            slice,
                        )?;
                    }
                }
                Attribution::Tenant(a) => {
                    tenants.insert(a.tenant_id.as_str());
                    merge_breakdowns(&mut provider_breakdown, &a.provider_breakdown)?;
                    for (agent_id, slice) in &a.agent_breakdown {
                        merge_slice(
                            agent_costs.entry(agent_id.as_str().to_owned()).or_default(),
                            slice,
                        )?;
                    }
                    for (workflow_id, slice) in &a.workflow_breakdown {
                        let entry = workflow_costs
                            .entry(workflow_id.as_str().to_owned())
                            .or_default();
                        entry.total_cost = entry.total_cost.checked_add(slice.total_cost).ok_or(
                            EngineError::ArithmeticOverflow {
                                context: "summary workflow merge",
                            },
                        )?;
                        entry.total_tokens = entry.total_tokens.saturating_add(slice.total_tokens);
                        entry.record_count = entry.record_count.saturating_add(slice.record_count);
                    }
                }
            }
        }

        Ok(AttributionSummary {
            total_cost,
            currency,
            record_count,
            execution_count: distinct_count(executions.len()),
            agent_count: distinct_count(agents.len()),
            workflow_count: distinct_count(workflows.len()),
            tenant_count: distinct_count(tenants.len()),
            start_time,
            end_time,
            provider_breakdown,
            model_breakdown,
            top_agents: top_rankings(agent_costs),
            top_workflows: top_rankings(workflow_costs),
            generated_at: self.clock.now(),
        })
    }
}

impl Default for CostAttributor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Shared accumulation machinery
// ---------------------------------------------------------------------------

/// Core accumulation state every scope group shares.
struct GroupCore {
    total_cost: Decimal,
    currency: Currency,
    record_count: u64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    scope: ScopeType,
}

impl GroupCore {
    const fn seed(record: &CostRecord, scope: ScopeType) -> Self {
        Self {
            total_cost: record.total_cost,
            currency: record.currency,
            record_count: 1,
            start_time: record.timestamp,
            end_time: record.timestamp,
            scope,
        }
    }

    fn absorb(&mut self, record: &CostRecord) -> Result<(), EngineError> {
        if record.currency != self.currency {
            return Err(EngineError::CurrencyMismatch {
                scope: self.scope,
                expected: self.currency,
                found: record.currency,
            });
        }
        self.total_cost = self.total_cost.checked_add(record.total_cost).ok_or(
            EngineError::ArithmeticOverflow {
                context: "attribution cost sum",
            },
        )?;
        self.record_count = self.record_count.saturating_add(1);
        self.start_time = self.start_time.min(record.timestamp);
        self.end_time = self.end_time.max(record.timestamp);
        Ok(())
    }
}

/// Add one record's cost, tokens, and count to a breakdown slice.
fn absorb_slice<K: Ord>(
    map: &mut BTreeMap<K, ScopeBreakdown>,
    key: K,
    record: &CostRecord,
) -> Result<(), EngineError> {
    let slice = map.entry(key).or_default();
    slice.total_cost = slice.total_cost.checked_add(record.total_cost).ok_or(
        EngineError::ArithmeticOverflow {
            context: "breakdown cost sum",
        },
    )?;
    slice.total_tokens = slice.total_tokens.saturating_add(record.total_tokens());
    slice.record_count = slice.record_count.saturating_add(1);
    Ok(())
}

/// Merge one breakdown slice into another (summary merging).
fn merge_slice(into: &mut ScopeBreakdown, from: &ScopeBreakdown) -> Result<(), EngineError> {
    into.total_cost = into.total_cost.checked_add(from.total_cost).ok_or(
        EngineError::ArithmeticOverflow {
            context: "summary breakdown merge",
        },
    )?;
    into.total_tokens = into.total_tokens.saturating_add(from.total_tokens);
    into.record_count = into.record_count.saturating_add(from.record_count);
    Ok(())
}

/// Merge a whole breakdown map into an accumulator map, key by key.
fn merge_breakdowns(
    into: &mut BTreeMap<String, ScopeBreakdown>,
    from: &BTreeMap<String, ScopeBreakdown>,
) -> Result<(), EngineError> {
    for (key, slice) in from {
        merge_slice(into.entry(key.clone()).or_default(), slice)?;
    }
    Ok(())
}

/// Rank a merged cost map, highest cost first, ties by key order.
fn top_rankings(costs: BTreeMap<String, ScopeBreakdown>) -> Vec<CostRanking> {
    let mut rankings: Vec<CostRanking> = costs
        .into_iter()
        .map(|(id, slice)| CostRanking {
            id,
            total_cost: slice.total_cost,
            total_tokens: slice.total_tokens,
            record_count: slice.record_count,
        })
        .collect();
    rankings.sort_by(|a, b| {
        b.total_cost
            .cmp(&a.total_cost)
            .then_with(|| a.id.cmp(&b.id))
    });
    rankings.truncate(TOP_RANKINGS);
    rankings
}

fn distinct_count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Per-scope accumulators
// ---------------------------------------------------------------------------

struct ExecutionGroup {
    core: GroupCore,
    agent_id: AgentId,
    workflow_id: Option<WorkflowId>,
    tenant_id: Option<TenantId>,
    input_tokens: u64,
    output_tokens: u64,
    cached_input_tokens: u64,
    provider_breakdown: BTreeMap<String, ScopeBreakdown>,
}

impl ExecutionGroup {
    fn seed(record: &CostRecord) -> Result<Self, EngineError> {
        let mut group = Self {
            core: GroupCore::seed(record, ScopeType::Execution),
            agent_id: record.agent_id.clone(),
            workflow_id: record.workflow_id.clone(),
            tenant_id: record.tenant_id.clone(),
            input_tokens: record.input_tokens,
            output_tokens: record.output_tokens,
            cached_input_tokens: record.cached_input_tokens,
            provider_breakdown: BTreeMap::new(),
        };
        absorb_slice(&mut group.provider_breakdown, record.provider.clone(), record)?;
        Ok(group)
    }

    fn absorb(&mut self, record: &CostRecord) -> Result<(), EngineError> {
        self.core.absorb(record)?;
        self.input_tokens = self.input_tokens.saturating_add(record.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(record.output_tokens);
        self.cached_input_tokens = self
            .cached_input_tokens
            .saturating_add(record.cached_input_tokens);
        // Identity fields keep the first value observed in the group.
        if self.workflow_id.is_none() {
            self.workflow_id = record.workflow_id.clone();
        }
        if self.tenant_id.is_none() {
            self.tenant_id = record.tenant_id.clone();
        }
        absorb_slice(&mut self.provider_breakdown, record.provider.clone(), record)
    }

    fn finish(self, execution_id: ExecutionId) -> ExecutionAttribution {
        ExecutionAttribution {
            execution_id,
            agent_id: self.agent_id,
            workflow_id: self.workflow_id,
            tenant_id: self.tenant_id,
            total_cost: self.core.total_cost,
            currency: self.core.currency,
            record_count: self.core.record_count,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cached_input_tokens: self.cached_input_tokens,
            start_time: self.core.start_time,
            end_time: self.core.end_time,
            provider_breakdown: self.provider_breakdown,
        }
    }
}

struct AgentGroup {
    core: GroupCore,
    executions: BTreeSet<ExecutionId>,
    provider_breakdown: BTreeMap<String, ScopeBreakdown>,
    model_breakdown: BTreeMap<String, ScopeBreakdown>,
}

impl AgentGroup {
    fn seed(record: &CostRecord) -> Result<Self, EngineError> {
        let mut group = Self {
            core: GroupCore::seed(record, ScopeType::Agent),
            executions: BTreeSet::new(),
            provider_breakdown: BTreeMap::new(),
            model_breakdown: BTreeMap::new(),
        };
        group.executions.insert(record.execution_id.clone());
        absorb_slice(&mut group.provider_breakdown, record.provider.clone(), record)?;
        absorb_slice(&mut group.model_breakdown, record.model.clone(), record)?;
        Ok(group)
    }

    fn absorb(&mut self, record: &CostRecord) -> Result<(), EngineError> {
        self.core.absorb(record)?;
        self.executions.insert(record.execution_id.clone());
        absorb_slice(&mut self.provider_breakdown, record.provider.clone(), record)?;
        absorb_slice(&mut self.model_breakdown, record.model.clone(), record)
    }

    fn finish(self, agent_id: AgentId) -> AgentAttribution {
        AgentAttribution {
            agent_id,
            total_cost: self.core.total_cost,
            currency: self.core.currency,
            record_count: self.core.record_count,
            execution_count: distinct_count(self.executions.len()),
            start_time: self.core.start_time,
            end_time: self.core.end_time,
            provider_breakdown: self.provider_breakdown,
            model_breakdown: self.model_breakdown,
        }
    }
}

struct WorkflowGroup {
    core: GroupCore,
    agents: BTreeSet<AgentId>,
    executions: BTreeSet<ExecutionId>,
    agent_breakdown: BTreeMap<AgentId, ScopeBreakdown>,
    provider_breakdown: BTreeMap<String, ScopeBreakdown>,
}

impl WorkflowGroup {
    fn seed(record: &CostRecord) -> Result<Self, EngineError> {
        let mut group = Self {
            core: GroupCore::seed(record, ScopeType::Workflow),
            agents: BTreeSet::new(),
            executions: BTreeSet::new(),
            agent_breakdown: BTreeMap::new(),
            provider_breakdown: BTreeMap::new(),
        };
        group.agents.insert(record.agent_id.clone());
        group.executions.insert(record.execution_id.clone());
        absorb_slice(&mut group.agent_breakdown, record.agent_id.clone(), record)?;
        absorb_slice(&mut group.provider_breakdown, record.provider.clone(), record)?;
        Ok(group)
    }

    fn absorb(&mut self, record: &CostRecord) -> Result<(), EngineError> {
        self.core.absorb(record)?;
        self.agents.insert(record.agent_id.clone());
        self.executions.insert(record.execution_id.clone());
        absorb_slice(&mut self.agent_breakdown, record.agent_id.clone(), record)?;
        absorb_slice(&mut self.provider_breakdown, record.provider.clone(), record)
    }

    fn finish(self, workflow_id: WorkflowId) -> WorkflowAttribution {
        WorkflowAttribution {
            workflow_id,
            total_cost: self.core.total_cost,
            currency: self.core.currency,
            record_count: self.core.record_count,
            agent_count: distinct_count(self.agents.len()),
            execution_count: distinct_count(self.executions.len()),
            start_time: self.core.start_time,
            end_time: self.core.end_time,
            agent_breakdown: self.agent_breakdown,
            provider_breakdown: self.provider_breakdown,
        }
    }
}

/// Per-workflow accumulation inside a tenant group: cost slice plus that
/// workflow's own distinct-agent set.
#[derive(Default)]
struct WorkflowSlice {
    breakdown: ScopeBreakdown,
    agents: BTreeSet<AgentId>,
}

struct TenantGroup {
    core: GroupCore,
    workflows: BTreeSet<WorkflowId>,
    agents: BTreeSet<AgentId>,
    executions: BTreeSet<ExecutionId>,
    workflow_slices: BTreeMap<WorkflowId, WorkflowSlice>,
    agent_breakdown: BTreeMap<AgentId, ScopeBreakdown>,
    provider_breakdown: BTreeMap<String, ScopeBreakdown>,
}

impl TenantGroup {
    fn seed(record: &CostRecord) -> Result<Self, EngineError> {
        let mut group = Self {
            core: GroupCore::seed(record, ScopeType::Tenant),
            workflows: BTreeSet::new(),
            agents: BTreeSet::new(),
            executions: BTreeSet::new(),
            workflow_slices: BTreeMap::new(),
            agent_breakdown: BTreeMap::new(),
            provider_breakdown: BTreeMap::new(),
        };
        group.track(record)?;
        Ok(group)
    }

    fn absorb(&mut self, record: &CostRecord) -> Result<(), EngineError> {
        self.core.absorb(record)?;
        self.track(record)
    }

    /// Distinct-set and breakdown updates shared by seed and absorb.
    fn track(&mut self, record: &CostRecord) -> Result<(), EngineError> {
        self.agents.insert(record.agent_id.clone());
        self.executions.insert(record.execution_id.clone());
        absorb_slice(&mut self.agent_breakdown, record.agent_id.clone(), record)?;
        absorb_slice(&mut self.provider_breakdown, record.provider.clone(), record)?;

        // Records with no workflow count toward the tenant totals above
        // but not toward the workflow breakdown.
        if let Some(workflow_id) = &record.workflow_id {
            self.workflows.insert(workflow_id.clone());
            let slice = self.workflow_slices.entry(workflow_id.clone()).or_default();
            slice.breakdown.total_cost = slice
                .breakdown
                .total_cost
                .checked_add(record.total_cost)
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "workflow breakdown cost sum",
                })?;
            slice.breakdown.total_tokens = slice
                .breakdown
                .total_tokens
                .saturating_add(record.total_tokens());
            slice.breakdown.record_count = slice.breakdown.record_count.saturating_add(1);
            slice.agents.insert(record.agent_id.clone());
        }
        Ok(())
    }

    fn finish(self, tenant_id: TenantId) -> TenantAttribution {
        let workflow_breakdown = self
            .workflow_slices
            .into_iter()
            .map(|(workflow_id, slice)| {
                (
                    workflow_id,
                    WorkflowBreakdown {
                        total_cost: slice.breakdown.total_cost,
                        total_tokens: slice.breakdown.total_tokens,
                        record_count: slice.breakdown.record_count,
                        agent_count: distinct_count(slice.agents.len()),
                    },
                )
            })
            .collect();

        TenantAttribution {
            tenant_id,
            total_cost: self.core.total_cost,
            currency: self.core.currency,
            record_count: self.core.record_count,
            workflow_count: distinct_count(self.workflows.len()),
            agent_count: distinct_count(self.agents.len()),
            execution_count: distinct_count(self.executions.len()),
            start_time: self.core.start_time,
            end_time: self.core.end_time,
            workflow_breakdown,
            agent_breakdown: self.agent_breakdown,
            provider_breakdown: self.provider_breakdown,
        }
    }
}
