//! End-to-end processing pipeline: usage in, attributed costs out.
//!
//! The pipeline wires the engine's components together in a fixed order:
//!
//! ```text
//! UsageRecord batch
//!   -> (optional) token normalization, counts substituted
//!   -> cost calculation against one pricing table
//!   -> attribution by execution, agent, workflow, and tenant
//!   -> cross-scope summary
//! ```
//!
//! Each component stays independently callable; the pipeline only
//! sequences them and owns the normalize-or-not decision from its
//! settings. This module is also the engine's single emission point for
//! `tracing` events -- the components themselves stay silent.

use serde::Serialize;
use tracing::{debug, info};

use costscope_types::{
    AgentAttribution, Attribution, AttributionSummary, CostRecord, ExecutionAttribution,
    NormalizedUsage, PricingTable, TenantAttribution, UsageRecord, WorkflowAttribution,
};

use crate::attributor::CostAttributor;
use crate::calculator::CostCalculator;
use crate::error::EngineError;
use crate::normalizer::TokenNormalizer;
use crate::settings::{EngineSettings, PipelineSettings};

/// Everything one processed batch produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    /// One cost record per input usage record, in input order.
    pub cost_records: Vec<CostRecord>,
    /// Per-execution attributions, ordered by execution ID.
    pub executions: Vec<ExecutionAttribution>,
    /// Per-agent attributions, ordered by agent ID.
    pub agents: Vec<AgentAttribution>,
    /// Per-workflow attributions; records without a workflow are absent.
    pub workflows: Vec<WorkflowAttribution>,
    /// Per-tenant attributions; records without a tenant are absent.
    pub tenants: Vec<TenantAttribution>,
    /// Summary over the union of all four attribution collections.
    pub summary: AttributionSummary,
}

impl PipelineOutcome {
    /// All attributions as one tagged collection, execution first, then
    /// agent, workflow, and tenant.
    pub fn attributions(&self) -> Vec<Attribution> {
        let mut attributions: Vec<Attribution> = Vec::new();
        attributions.extend(self.executions.iter().cloned().map(Attribution::Execution));
        attributions.extend(self.agents.iter().cloned().map(Attribution::Agent));
        attributions.extend(self.workflows.iter().cloned().map(Attribution::Workflow));
        attributions.extend(self.tenants.iter().cloned().map(Attribution::Tenant));
        attributions
    }
}

/// Sequences normalization, calculation, attribution, and summary.
#[derive(Debug)]
pub struct CostPipeline {
    normalizer: TokenNormalizer,
    calculator: CostCalculator,
    attributor: CostAttributor,
    settings: PipelineSettings,
}

impl CostPipeline {
    /// Create a pipeline with default components and default settings
    /// (normalization off).
    pub fn new() -> Self {
        Self {
            normalizer: TokenNormalizer::with_defaults(),
            calculator: CostCalculator::new(),
            attributor: CostAttributor::new(),
            settings: PipelineSettings::default(),
        }
    }

    /// Create a pipeline configured from engine settings: the normalizer
    /// picks up the configured baseline and registry entries, the
    /// pipeline picks up the normalize toggle.
    pub fn with_settings(settings: &EngineSettings) -> Self {
        Self {
            normalizer: TokenNormalizer::from_settings(&settings.normalization),
            calculator: CostCalculator::new(),
            attributor: CostAttributor::new(),
            settings: settings.pipeline,
        }
    }

    /// Replace the normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: TokenNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the calculator.
    #[must_use]
    pub fn with_calculator(mut self, calculator: CostCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    /// Replace the attributor.
    #[must_use]
    pub fn with_attributor(mut self, attributor: CostAttributor) -> Self {
        self.attributor = attributor;
        self
    }

    /// Process one usage batch against one pricing table.
    ///
    /// When normalization is enabled, calculation runs on the normalized
    /// token counts; the raw records are otherwise passed through
    /// untouched. All four attribution views and the summary are always
    /// produced.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyBatch`] for an empty input slice and
    /// propagates any calculation or attribution failure unchanged; the
    /// batch aborts on the first failing record.
    pub fn process(
        &self,
        usages: &[UsageRecord],
        pricing: &PricingTable,
    ) -> Result<PipelineOutcome, EngineError> {
        if usages.is_empty() {
            return Err(EngineError::EmptyBatch {
                operation: "pipeline process",
            });
        }

        debug!(
            records = usages.len(),
            provider = %pricing.provider,
            model = %pricing.model,
            normalize = self.settings.normalize,
            "processing usage batch"
        );

        let cost_records = if self.settings.normalize {
            let normalized = self.normalizer.normalize_batch(usages);
            let substituted: Vec<UsageRecord> =
                normalized.iter().map(NormalizedUsage::to_usage).collect();
            self.calculator.calculate_batch(&substituted, pricing)?
        } else {
            self.calculator.calculate_batch(usages, pricing)?
        };

        let executions = CostAttributor::attribute_by_execution(&cost_records)?;
        let agents = CostAttributor::attribute_by_agent(&cost_records)?;
        let workflows = CostAttributor::attribute_by_workflow(&cost_records)?;
        let tenants = CostAttributor::attribute_by_tenant(&cost_records)?;

        let mut attributions: Vec<Attribution> = Vec::new();
        attributions.extend(executions.iter().cloned().map(Attribution::Execution));
        attributions.extend(agents.iter().cloned().map(Attribution::Agent));
        attributions.extend(workflows.iter().cloned().map(Attribution::Workflow));
        attributions.extend(tenants.iter().cloned().map(Attribution::Tenant));
        let summary = self.attributor.generate_summary(&attributions)?;

        info!(
            records = cost_records.len(),
            executions = executions.len(),
            agents = agents.len(),
            total_cost = %summary.total_cost,
            currency = %summary.currency,
            "usage batch processed"
        );

        Ok(PipelineOutcome {
            cost_records,
            executions,
            agents,
            workflows,
            tenants,
            summary,
        })
    }
}

impl Default for CostPipeline {
    fn default() -> Self {
        Self::new()
    }
}
