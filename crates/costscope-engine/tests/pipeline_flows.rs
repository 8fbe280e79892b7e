//! End-to-end tests for the cost engine.
//!
//! These exercise the public surface the way a caller would: raw usage in,
//! calculated and attributed cost out, with reconciliation verifying that
//! no step created or destroyed money along the way.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::items_after_statements,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use chrono::{DateTime, TimeZone, Utc};
use costscope_engine::reconcile::{self, ReconciliationResult};
use costscope_engine::{
    CostAttributor, CostCalculator, CostPipeline, EngineError, EngineSettings, ErrorKind,
    FixedClock, TokenNormalizer,
};
use costscope_types::{
    Attribution, CostRecord, Currency, NormalizationMethod, PricingModel, PricingTable,
    PricingTier, ScopeType, UsageRecord,
};
use rust_decimal::Decimal;

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn opus_usage() -> UsageRecord {
    UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 1000, 500)
        .with_timestamp(fixed_time())
}

fn opus_pricing() -> PricingTable {
    PricingTable::new(
        "anthropic",
        "claude-3-opus",
        PricingModel::per_token(Decimal::new(1500, 2), Decimal::new(7500, 2)),
        Currency::Usd,
    )
}

fn tagged_attributions(records: &[CostRecord]) -> Vec<Attribution> {
    let mut attributions: Vec<Attribution> = Vec::new();
    attributions.extend(
        CostAttributor::attribute_by_execution(records)
            .expect("execution attribution succeeds")
            .into_iter()
            .map(Attribution::Execution),
    );
    attributions.extend(
        CostAttributor::attribute_by_agent(records)
            .expect("agent attribution succeeds")
            .into_iter()
            .map(Attribution::Agent),
    );
    attributions.extend(
        CostAttributor::attribute_by_workflow(records)
            .expect("workflow attribution succeeds")
            .into_iter()
            .map(Attribution::Workflow),
    );
    attributions.extend(
        CostAttributor::attribute_by_tenant(records)
            .expect("tenant attribution succeeds")
            .into_iter()
            .map(Attribution::Tenant),
    );
    attributions
}

// =============================================================================
// Calculation scenarios
// =============================================================================

#[test]
fn per_token_pricing_produces_exact_component_costs() {
    let calculator = CostCalculator::new();
    let record = calculator
        .calculate(&opus_usage(), &opus_pricing())
        .expect("calculation succeeds");

    assert_eq!(record.input_token_cost.to_string(), "0.0150000000");
    assert_eq!(record.output_token_cost.to_string(), "0.0375000000");
    assert_eq!(record.cached_input_token_cost.to_string(), "0.0000000000");
    assert_eq!(record.request_cost.to_string(), "0.0000000000");
    assert_eq!(record.total_cost.to_string(), "0.0525000000");
    assert!(record.components_balance());
}

#[test]
fn cached_tokens_bill_at_the_discounted_rate() {
    let usage = opus_usage().with_cached_tokens(200);
    let pricing = PricingTable::new(
        "anthropic",
        "claude-3-opus",
        PricingModel::per_token_with_cache(
            Decimal::new(1500, 2),
            Decimal::new(7500, 2),
            Decimal::new(150, 2),
        ),
        Currency::Usd,
    );

    let record = CostCalculator::new()
        .calculate(&usage, &pricing)
        .expect("calculation succeeds");

    assert_eq!(record.cached_input_token_cost.to_string(), "0.0003000000");
    assert_eq!(record.total_cost.to_string(), "0.0528000000");
    assert!(record.components_balance());
}

#[test]
fn per_request_pricing_ignores_token_volume() {
    let usage = UsageRecord::new("exec-1", "ag1", "openai", "gpt-4", 12345, 678)
        .with_request_count(5)
        .with_timestamp(fixed_time());
    let pricing = PricingTable::new(
        "openai",
        "gpt-4",
        PricingModel::per_request(Decimal::new(2, 3)),
        Currency::Usd,
    );

    let record = CostCalculator::new()
        .calculate(&usage, &pricing)
        .expect("calculation succeeds");

    assert_eq!(record.request_cost.to_string(), "0.0100000000");
    assert_eq!(record.input_token_cost, Decimal::ZERO);
    assert_eq!(record.output_token_cost, Decimal::ZERO);
    assert_eq!(record.cached_input_token_cost, Decimal::ZERO);
    assert_eq!(record.total_cost.to_string(), "0.0100000000");
}

#[test]
fn calculation_is_idempotent_apart_from_timestamps() {
    let calculator = CostCalculator::with_clock(Box::new(FixedClock::new(fixed_time())));

    let first = calculator
        .calculate(&opus_usage(), &opus_pricing())
        .expect("first calculation succeeds");
    let second = calculator
        .calculate(&opus_usage(), &opus_pricing())
        .expect("second calculation succeeds");

    assert_eq!(first.input_token_cost, second.input_token_cost);
    assert_eq!(first.output_token_cost, second.output_token_cost);
    assert_eq!(first.total_cost, second.total_cost);
    assert_eq!(first.calculated_at, second.calculated_at);
}

#[test]
fn tier_selection_uses_inclusive_boundaries() {
    let pricing = PricingTable::new(
        "openai",
        "gpt-4",
        PricingModel::tiered(vec![
            PricingTier::new(0, 1000, Decimal::new(2, 5)),
            PricingTier::open_ended(1001, Decimal::new(1, 5)),
        ]),
        Currency::Usd,
    );
    let calculator = CostCalculator::new();

    // Exactly 1000 total tokens: first tier at 0.00002 per token.
    let at_boundary = UsageRecord::new("exec-1", "ag1", "openai", "gpt-4", 600, 400)
        .with_timestamp(fixed_time());
    let record = calculator
        .calculate(&at_boundary, &pricing)
        .expect("boundary calculation succeeds");
    assert_eq!(record.total_cost.to_string(), "0.0200000000");

    // 1001 total tokens: second tier at 0.00001 per token.
    let over_boundary = UsageRecord::new("exec-2", "ag1", "openai", "gpt-4", 600, 401)
        .with_timestamp(fixed_time());
    let record = calculator
        .calculate(&over_boundary, &pricing)
        .expect("over-boundary calculation succeeds");
    assert_eq!(record.total_cost.to_string(), "0.0100100000");
}

// =============================================================================
// Normalization scenarios
// =============================================================================

#[test]
fn unknown_provider_normalizes_to_identity() {
    let normalizer = TokenNormalizer::with_defaults();
    let usage =
        UsageRecord::new("exec-1", "ag1", "acme", "x1", 1000, 500).with_timestamp(fixed_time());

    let normalized = normalizer.normalize(&usage);

    assert_eq!(normalized.normalized_input_tokens, 1000);
    assert_eq!(normalized.normalized_output_tokens, 500);
    assert_eq!(normalized.normalization_factor, Decimal::ONE);
    assert_eq!(normalized.normalization_method, NormalizationMethod::Raw);
}

// =============================================================================
// Attribution scenarios
// =============================================================================

#[test]
fn one_agent_three_executions_attribute_to_one_group() {
    let calculator = CostCalculator::new();
    let pricing = opus_pricing();
    let usages = vec![
        UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 1000, 500)
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-2", "ag1", "anthropic", "claude-3-opus", 2000, 1000)
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-3", "ag1", "anthropic", "claude-3-opus", 100, 50)
            .with_timestamp(fixed_time()),
    ];

    let records = calculator
        .calculate_batch(&usages, &pricing)
        .expect("batch calculation succeeds");
    let expected_total = records.iter().fold(Decimal::ZERO, |acc, record| {
        acc.checked_add(record.total_cost).expect("sum fits")
    });

    let agents = CostAttributor::attribute_by_agent(&records).expect("attribution succeeds");

    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].agent_id.as_str(), "ag1");
    assert_eq!(agents[0].execution_count, 3);
    assert_eq!(agents[0].record_count, 3);
    assert_eq!(agents[0].total_cost, expected_total);
}

#[test]
fn empty_summary_input_is_a_precondition_error() {
    let attributor = CostAttributor::new();
    let result = attributor.generate_summary(&[]);

    assert!(matches!(result, Err(EngineError::EmptySummaryInput)));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Precondition);
}

#[test]
fn summary_counts_shared_agent_once_across_executions() {
    let usages = vec![
        UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 1000, 500)
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-2", "ag1", "anthropic", "claude-3-opus", 1000, 500)
            .with_timestamp(fixed_time()),
    ];
    let records = CostCalculator::new()
        .calculate_batch(&usages, &opus_pricing())
        .expect("batch calculation succeeds");

    let executions: Vec<Attribution> = CostAttributor::attribute_by_execution(&records)
        .expect("attribution succeeds")
        .into_iter()
        .map(Attribution::Execution)
        .collect();
    assert_eq!(executions.len(), 2);

    let summary = CostAttributor::new()
        .generate_summary(&executions)
        .expect("summary succeeds");
    assert_eq!(summary.execution_count, 2);
    assert_eq!(summary.agent_count, 1);
}

#[test]
fn workflow_filtering_partitions_the_batch() {
    let usages = vec![
        UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 100, 50)
            .with_workflow("wf-1")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-2", "ag1", "anthropic", "claude-3-opus", 100, 50)
            .with_workflow("wf-2")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-3", "ag2", "anthropic", "claude-3-opus", 100, 50)
            .with_workflow("wf-1")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-4", "ag2", "anthropic", "claude-3-opus", 100, 50)
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-5", "ag3", "anthropic", "claude-3-opus", 100, 50)
            .with_timestamp(fixed_time()),
    ];
    let records = CostCalculator::new()
        .calculate_batch(&usages, &opus_pricing())
        .expect("batch calculation succeeds");

    let workflows = CostAttributor::attribute_by_workflow(&records).expect("attribution succeeds");

    let included: u64 = workflows.iter().map(|w| w.record_count).sum();
    let excluded = u64::try_from(
        records
            .iter()
            .filter(|record| record.workflow_id.is_none())
            .count(),
    )
    .expect("count fits");
    assert_eq!(included, 3);
    assert_eq!(excluded, 2);
    assert_eq!(
        included.checked_add(excluded).expect("no overflow"),
        u64::try_from(records.len()).expect("count fits")
    );
}

// =============================================================================
// Reconciliation
// =============================================================================

#[test]
fn attribution_conserves_cost_across_all_scopes() {
    let usages = vec![
        UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 1000, 500)
            .with_workflow("wf-1")
            .with_tenant("tn-1")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-2", "ag1", "anthropic", "claude-3-opus", 2000, 250)
            .with_workflow("wf-1")
            .with_tenant("tn-1")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-3", "ag2", "anthropic", "claude-3-opus", 777, 333)
            .with_tenant("tn-2")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-4", "ag3", "anthropic", "claude-3-opus", 50, 25)
            .with_timestamp(fixed_time()),
    ];
    let records = CostCalculator::new()
        .calculate_batch(&usages, &opus_pricing())
        .expect("batch calculation succeeds");
    let attributions = tagged_attributions(&records);

    for scope in [
        ScopeType::Execution,
        ScopeType::Agent,
        ScopeType::Workflow,
        ScopeType::Tenant,
    ] {
        assert_eq!(
            reconcile::verify_scope(scope, &records, &attributions),
            ReconciliationResult::Balanced,
            "scope {scope} must reconcile"
        );
    }
    assert_eq!(
        reconcile::verify_all(&records, &attributions),
        ReconciliationResult::Balanced
    );
}

// =============================================================================
// Pipeline
// =============================================================================

#[test]
fn pipeline_processes_a_mixed_batch_end_to_end() {
    let usages = vec![
        UsageRecord::new("exec-1", "ag1", "anthropic", "claude-3-opus", 1000, 500)
            .with_workflow("wf-1")
            .with_tenant("tn-1")
            .with_timestamp(fixed_time()),
        UsageRecord::new("exec-2", "ag2", "anthropic", "claude-3-opus", 1000, 500)
            .with_tenant("tn-1")
            .with_timestamp(fixed_time()),
    ];

    let pipeline = CostPipeline::new();
    let outcome = pipeline
        .process(&usages, &opus_pricing())
        .expect("pipeline succeeds");

    assert_eq!(outcome.cost_records.len(), 2);
    assert_eq!(outcome.executions.len(), 2);
    assert_eq!(outcome.agents.len(), 2);
    assert_eq!(outcome.workflows.len(), 1);
    assert_eq!(outcome.tenants.len(), 1);
    assert_eq!(outcome.summary.total_cost.to_string(), "0.1050000000");
    assert_eq!(outcome.summary.tenant_count, 1);

    // The outcome's own attributions reconcile against its records.
    assert_eq!(
        reconcile::verify_all(&outcome.cost_records, &outcome.attributions()),
        ReconciliationResult::Balanced
    );
}

#[test]
fn pipeline_settings_merge_custom_factors_over_builtins() {
    let yaml = r#"
pipeline:
  normalize: true
normalization:
  entries:
    - provider: "openai"
      input_token_factor: "1.1"
      output_token_factor: "0.9"
"#;
    let settings = EngineSettings::parse(yaml).expect("settings parse");
    let pipeline = CostPipeline::with_settings(&settings);

    let usages = vec![
        UsageRecord::new("exec-1", "ag1", "openai", "gpt-4", 1000, 500)
            .with_timestamp(fixed_time()),
    ];
    let pricing = PricingTable::new(
        "openai",
        "gpt-4",
        PricingModel::per_token(Decimal::new(1500, 2), Decimal::new(7500, 2)),
        Currency::Usd,
    );

    let outcome = pipeline.process(&usages, &pricing).expect("pipeline succeeds");

    // The custom factors replace the built-in openai identity entry.
    assert_eq!(outcome.cost_records[0].input_tokens, 1100);
    assert_eq!(outcome.cost_records[0].output_tokens, 450);
    // 1100 * 15/1M + 450 * 75/1M
    assert_eq!(outcome.cost_records[0].total_cost.to_string(), "0.0502500000");
}

// =============================================================================
// Wire format
// =============================================================================

#[test]
fn wire_records_flow_through_calculation() {
    let usage: UsageRecord = serde_json::from_str(
        r#"{
            "executionId": "exec-9",
            "agentId": "billing-agent",
            "provider": "anthropic",
            "model": "claude-3-opus",
            "inputTokens": 1000,
            "outputTokens": 500,
            "timestamp": "2026-01-15T10:00:00Z"
        }"#,
    )
    .expect("usage parses");

    let pricing: PricingTable = serde_json::from_str(
        r#"{
            "provider": "anthropic",
            "model": "claude-3-opus",
            "pricing": {
                "type": "PER_TOKEN",
                "inputTokenPrice": "15.00",
                "outputTokenPrice": "75.00"
            },
            "currency": "USD",
            "effectiveDate": "2026-01-01T00:00:00Z"
        }"#,
    )
    .expect("pricing parses");

    let record = CostCalculator::new()
        .calculate(&usage, &pricing)
        .expect("calculation succeeds");
    let json = serde_json::to_string(&record).expect("record serializes");

    assert!(json.contains("\"executionId\":\"exec-9\""));
    assert!(json.contains("\"totalCost\":\"0.0525000000\""));
    assert!(json.contains("\"currency\":\"USD\""));
}
