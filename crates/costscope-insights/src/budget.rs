//! Budget policy evaluation over attribution results.
//!
//! A [`BudgetPolicy`] caps spend for one scope (or globally) in one
//! currency. Evaluation is pure: it sums the matching attributions'
//! totals, computes utilization against the limit, and ranks the result
//! on a fixed severity ladder. Nothing is persisted and no thresholds
//! fire actions here; callers decide what a status means operationally.
//!
//! # Severity ladder
//!
//! | Utilization | Severity |
//! |-------------|----------|
//! | `< warning_threshold` | `Ok` |
//! | `>= warning_threshold` | `Warning` |
//! | `>= critical_threshold` | `Critical` |
//! | `>= 1.0` | `Exceeded` |

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costscope_types::{AgentId, Attribution, Currency, TenantId, WorkflowId};

use crate::error::InsightsError;

/// Decimal places utilization ratios are reported at.
const RATIO_SCALE: u32 = 4;

// ---------------------------------------------------------------------------
// Budget Scope
// ---------------------------------------------------------------------------

/// What a budget policy applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum BudgetScope {
    /// Every attribution counts toward the budget.
    Global,
    /// Only the named tenant's attributions count.
    Tenant(TenantId),
    /// Only the named workflow's attributions count.
    Workflow(WorkflowId),
    /// Only the named agent's attributions count.
    Agent(AgentId),
}

impl BudgetScope {
    /// Whether the given attribution counts toward this scope.
    ///
    /// Scoped budgets match only the attribution variant of their own
    /// level; a tenant budget never counts agent attributions, even for
    /// agents belonging to that tenant (that would double-count).
    pub fn matches(&self, attribution: &Attribution) -> bool {
        match self {
            Self::Global => true,
            Self::Tenant(id) => {
                matches!(attribution, Attribution::Tenant(a) if &a.tenant_id == id)
            }
            Self::Workflow(id) => {
                matches!(attribution, Attribution::Workflow(a) if &a.workflow_id == id)
            }
            Self::Agent(id) => {
                matches!(attribution, Attribution::Agent(a) if &a.agent_id == id)
            }
        }
    }
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Tenant(id) => write!(f, "tenant {id}"),
            Self::Workflow(id) => write!(f, "workflow {id}"),
            Self::Agent(id) => write!(f, "agent {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Budget Policy
// ---------------------------------------------------------------------------

/// A spend cap for one scope, with warning and critical thresholds as
/// fractions of the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPolicy {
    /// Name identifying the policy in statuses and errors.
    pub name: String,

    /// What the policy applies to.
    pub scope: BudgetScope,

    /// The spend cap.
    pub limit: Decimal,

    /// Currency the limit is denominated in. Matched attributions must
    /// agree.
    pub currency: Currency,

    /// Utilization fraction at which the status becomes `Warning`.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: Decimal,

    /// Utilization fraction at which the status becomes `Critical`.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: Decimal,
}

fn default_warning_threshold() -> Decimal {
    Decimal::new(80, 2)
}

fn default_critical_threshold() -> Decimal {
    Decimal::new(95, 2)
}

impl BudgetPolicy {
    /// Create a policy with the default 0.80 / 0.95 thresholds.
    pub fn new(
        name: impl Into<String>,
        scope: BudgetScope,
        limit: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            name: name.into(),
            scope,
            limit,
            currency,
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
        }
    }

    /// Override the warning and critical thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, warning: Decimal, critical: Decimal) -> Self {
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self
    }

    /// Check the policy's internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::InvalidPolicy`] when the limit is not
    /// positive or the thresholds do not satisfy
    /// `0 < warning < critical <= 1`.
    pub fn validate(&self) -> Result<(), InsightsError> {
        if self.limit <= Decimal::ZERO {
            return Err(self.invalid("limit must be positive"));
        }
        if self.warning_threshold <= Decimal::ZERO {
            return Err(self.invalid("warning threshold must be positive"));
        }
        if self.warning_threshold >= self.critical_threshold {
            return Err(self.invalid("warning threshold must be below the critical threshold"));
        }
        if self.critical_threshold > Decimal::ONE {
            return Err(self.invalid("critical threshold must not exceed 1"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> InsightsError {
        InsightsError::InvalidPolicy {
            name: self.name.clone(),
            reason: reason.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity and Status
// ---------------------------------------------------------------------------

/// How far into its budget a policy's scope has spent.
///
/// Ordered: `Ok < Warning < Critical < Exceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetSeverity {
    /// Spend is below the warning threshold.
    Ok,
    /// Spend reached the warning threshold.
    Warning,
    /// Spend reached the critical threshold.
    Critical,
    /// Spend reached or passed the limit itself.
    Exceeded,
}

impl BudgetSeverity {
    /// Return the `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Exceeded => "exceeded",
        }
    }
}

impl fmt::Display for BudgetSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of evaluating one policy against one attribution set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatus {
    /// Name of the evaluated policy.
    pub policy: String,

    /// The policy's scope.
    pub scope: BudgetScope,

    /// Exact spend summed over the matching attributions.
    pub current_spend: Decimal,

    /// The policy's limit.
    pub limit: Decimal,

    /// Budget left before the limit, floored at zero.
    pub remaining: Decimal,

    /// `current_spend / limit` at four decimal places.
    pub utilization: Decimal,

    /// Where the spend sits on the severity ladder.
    pub severity: BudgetSeverity,

    /// Human-readable one-line summary.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate budget policies against a set of attributions.
///
/// Pure and order-preserving: one status per policy, in input order.
/// Spend is the exact checked sum of the matching attributions' totals;
/// attributions outside a policy's scope are ignored entirely, including
/// their currency.
///
/// # Errors
///
/// Returns [`InsightsError::InvalidPolicy`] for an inconsistent policy,
/// [`InsightsError::CurrencyMismatch`] when a matched attribution's
/// currency differs from the policy's, and
/// [`InsightsError::ArithmeticOverflow`] when a sum leaves the decimal
/// range.
pub fn evaluate(
    policies: &[BudgetPolicy],
    attributions: &[Attribution],
) -> Result<Vec<BudgetStatus>, InsightsError> {
    let mut statuses = Vec::with_capacity(policies.len());

    for policy in policies {
        policy.validate()?;

        let mut spend = Decimal::ZERO;
        for attribution in attributions {
            if !policy.scope.matches(attribution) {
                continue;
            }
            if attribution.currency() != policy.currency {
                return Err(InsightsError::CurrencyMismatch {
                    policy: policy.name.clone(),
                    expected: policy.currency,
                    found: attribution.currency(),
                });
            }
            spend = spend.checked_add(attribution.total_cost()).ok_or(
                InsightsError::ArithmeticOverflow {
                    context: "budget spend sum",
                },
            )?;
        }

        let utilization = ratio(spend, policy.limit)?;
        let severity = severity_for(utilization, policy);
        let remaining = if spend >= policy.limit {
            Decimal::ZERO
        } else {
            policy
                .limit
                .checked_sub(spend)
                .ok_or(InsightsError::ArithmeticOverflow {
                    context: "budget remaining",
                })?
        };
        let message = format!(
            "budget {} is {}: {} of {} {} spent",
            policy.name, severity, spend, policy.limit, policy.currency
        );

        statuses.push(BudgetStatus {
            policy: policy.name.clone(),
            scope: policy.scope.clone(),
            current_spend: spend,
            limit: policy.limit,
            remaining,
            utilization,
            severity,
            message,
        });
    }

    Ok(statuses)
}

/// Spend over limit at the fixed ratio scale.
fn ratio(spend: Decimal, limit: Decimal) -> Result<Decimal, InsightsError> {
    let mut value = spend
        .checked_div(limit)
        .ok_or(InsightsError::ArithmeticOverflow {
            context: "budget utilization",
        })?;
    value = value.round_dp(RATIO_SCALE);
    value.rescale(RATIO_SCALE);
    Ok(value)
}

fn severity_for(utilization: Decimal, policy: &BudgetPolicy) -> BudgetSeverity {
    if utilization >= Decimal::ONE {
        BudgetSeverity::Exceeded
    } else if utilization >= policy.critical_threshold {
        BudgetSeverity::Critical
    } else if utilization >= policy.warning_threshold {
        BudgetSeverity::Warning
    } else {
        BudgetSeverity::Ok
    }
}
