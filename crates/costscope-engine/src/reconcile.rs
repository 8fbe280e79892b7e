//! Reconciliation of attribution totals against their source records.
//!
//! Attribution must never create or destroy cost: for every scope, the sum
//! over the attributions equals the sum over the records that carry that
//! scope's ID. Reconciliation recomputes both sides independently and
//! compares them exactly, cost and record count alike.
//!
//! For a scope S the check is:
//!
//! ```text
//! sum(record.total_cost where record carries S's id)
//!     == sum(attribution.total_cost where attribution.scope == S)
//! ```
//!
//! and the same for record counts. A violation produces a
//! [`ReconciliationDrift`], the engine's most serious integrity alert.

use rust_decimal::Decimal;

use costscope_types::{Attribution, CostRecord, ScopeType};

/// The result of reconciling one scope (or all scopes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// Attribution totals match the source records exactly.
    Balanced,
    /// A scope's totals diverged from its source records.
    Drift(ReconciliationDrift),
}

/// Details of a cost or record-count divergence in one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationDrift {
    /// The scope whose totals diverged.
    pub scope_type: ScopeType,
    /// Cost summed over the source records in scope.
    pub expected_cost: Decimal,
    /// Cost summed over the attributions of this scope.
    pub attributed_cost: Decimal,
    /// Record count on the source side.
    pub expected_records: u64,
    /// Record count summed over the attributions.
    pub attributed_records: u64,
    /// Human-readable description, prefixed `COST_DRIFT`.
    pub message: String,
}

impl core::fmt::Display for ReconciliationDrift {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Returns `true` if the record carries the ID the scope groups by.
///
/// Execution and agent IDs are mandatory, so those scopes cover every
/// record; workflow and tenant views only cover records tagged with the
/// respective ID.
const fn carries_scope_id(scope: ScopeType, record: &CostRecord) -> bool {
    match scope {
        ScopeType::Execution | ScopeType::Agent => true,
        ScopeType::Workflow => record.workflow_id.is_some(),
        ScopeType::Tenant => record.tenant_id.is_some(),
    }
}

/// Sum cost and record count over `(cost, count)` pairs.
///
/// Returns `None` when the cost sum overflows the decimal range; callers
/// turn that into a drift rather than a panic.
fn sum_totals(parts: impl Iterator<Item = (Decimal, u64)>) -> Option<(Decimal, u64)> {
    let mut total_cost = Decimal::ZERO;
    let mut total_records = 0u64;
    for (cost, count) in parts {
        total_cost = total_cost.checked_add(cost)?;
        total_records = total_records.saturating_add(count);
    }
    Some((total_cost, total_records))
}

/// Construct a drift result for arithmetic overflow during summation.
fn overflow_drift(scope: ScopeType) -> ReconciliationResult {
    ReconciliationResult::Drift(ReconciliationDrift {
        scope_type: scope,
        expected_cost: Decimal::ZERO,
        attributed_cost: Decimal::ZERO,
        expected_records: 0,
        attributed_records: 0,
        message: format!("COST_DRIFT in {scope} scope: arithmetic overflow while summing costs"),
    })
}

/// Verify one scope's attributions against the source records.
///
/// The expected side sums every record carrying the scope's ID; the
/// attributed side sums the given attributions of that scope type (other
/// variants in the slice are ignored). Any cost or record-count
/// difference is a drift.
#[must_use]
pub fn verify_scope(
    scope: ScopeType,
    records: &[CostRecord],
    attributions: &[Attribution],
) -> ReconciliationResult {
    let expected = sum_totals(
        records
            .iter()
            .filter(|record| carries_scope_id(scope, record))
            .map(|record| (record.total_cost, 1)),
    );
    let Some((expected_cost, expected_records)) = expected else {
        return overflow_drift(scope);
    };

    let attributed = sum_totals(
        attributions
            .iter()
            .filter(|attribution| attribution.scope_type() == scope)
            .map(|attribution| (attribution.total_cost(), attribution.record_count())),
    );
    let Some((attributed_cost, attributed_records)) = attributed else {
        return overflow_drift(scope);
    };

    if expected_cost == attributed_cost && expected_records == attributed_records {
        ReconciliationResult::Balanced
    } else {
        ReconciliationResult::Drift(ReconciliationDrift {
            scope_type: scope,
            expected_cost,
            attributed_cost,
            expected_records,
            attributed_records,
            message: format!(
                "COST_DRIFT in {scope} scope: expected {expected_cost} over \
                 {expected_records} record(s), attributed {attributed_cost} over \
                 {attributed_records} record(s)",
            ),
        })
    }
}

/// Verify all four scopes in one call; the first drift wins.
///
/// Scope order is execution, agent, workflow, tenant.
#[must_use]
pub fn verify_all(records: &[CostRecord], attributions: &[Attribution]) -> ReconciliationResult {
    for scope in [
        ScopeType::Execution,
        ScopeType::Agent,
        ScopeType::Workflow,
        ScopeType::Tenant,
    ] {
        let result = verify_scope(scope, records, attributions);
        if let ReconciliationResult::Drift(_) = &result {
            return result;
        }
    }
    ReconciliationResult::Balanced
}
