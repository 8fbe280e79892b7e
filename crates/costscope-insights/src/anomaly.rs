//! Statistical outlier detection over cost records.
//!
//! Scores every record's total cost against the batch mean in standard
//! deviations (z-score over the population deviation) and flags records
//! beyond a configurable threshold. Detection is batch-local: the mean
//! and deviation come from the records passed in, not from history, so
//! the caller chooses the comparison window by choosing the batch.
//!
//! Costs are analyzed as `f64`. The loss of decimal exactness is
//! acceptable here: scores rank records, they are never billed.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use costscope_types::{CostRecord, CostRecordId, ExecutionId};

use crate::error::InsightsError;

/// Default z-score at which a record is flagged.
const DEFAULT_THRESHOLD_SIGMA: f64 = 2.0;

/// Default minimum batch size for a meaningful deviation estimate.
const DEFAULT_MIN_POINTS: usize = 8;

/// Multiplier over the base threshold at which severity becomes `High`.
const HIGH_FACTOR: f64 = 1.5;

/// Multiplier over the base threshold at which severity becomes
/// `Critical`.
const CRITICAL_FACTOR: f64 = 2.0;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for [`detect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnomalyDetectorConfig {
    /// Z-score at which a record is flagged as anomalous.
    pub threshold_sigma: f64,

    /// Minimum number of records required before detection runs.
    pub min_points: usize,
}

impl Default for AnomalyDetectorConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: DEFAULT_THRESHOLD_SIGMA,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

impl AnomalyDetectorConfig {
    /// Check the configuration's internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::InvalidConfig`] when the threshold is
    /// not a positive finite number or `min_points` is below two (the
    /// deviation of a single point is always zero).
    pub fn validate(&self) -> Result<(), InsightsError> {
        if !self.threshold_sigma.is_finite() || self.threshold_sigma <= 0.0 {
            return Err(InsightsError::InvalidConfig {
                reason: "threshold sigma must be a positive finite number".to_owned(),
            });
        }
        if self.min_points < 2 {
            return Err(InsightsError::InvalidConfig {
                reason: "min points must be at least 2".to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How far past the detection threshold an anomaly's score sits.
///
/// Ordered: `Moderate < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    /// At or past the threshold.
    Moderate,
    /// At or past 1.5x the threshold.
    High,
    /// At or past 2x the threshold.
    Critical,
}

impl AnomalySeverity {
    /// Return the `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl core::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One flagged cost record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnomaly {
    /// The flagged record.
    pub record_id: CostRecordId,

    /// The execution the record belongs to.
    pub execution_id: ExecutionId,

    /// The record's exact total cost.
    pub cost: Decimal,

    /// Absolute z-score of the record's cost within the batch.
    pub score: f64,

    /// Severity bucket derived from the score.
    pub severity: AnomalySeverity,
}

/// The outcome of one detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    /// Flagged records, highest score first.
    pub anomalies: Vec<CostAnomaly>,

    /// Number of records analyzed.
    pub total_points: usize,

    /// Fraction of analyzed records that were flagged.
    pub anomaly_rate: f64,

    /// The threshold the pass ran with.
    pub threshold_sigma: f64,

    /// Batch mean cost.
    pub mean_cost: f64,

    /// Batch population standard deviation of cost.
    pub stddev_cost: f64,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Score a batch of cost records and flag statistical outliers.
///
/// A batch whose costs are all identical has zero deviation and produces
/// no anomalies rather than dividing by zero.
///
/// # Errors
///
/// Returns [`InsightsError::InvalidConfig`] for an inconsistent
/// configuration, [`InsightsError::EmptyInput`] for an empty batch, and
/// [`InsightsError::InsufficientData`] when the batch is smaller than
/// the configured minimum.
pub fn detect(
    records: &[CostRecord],
    config: &AnomalyDetectorConfig,
) -> Result<AnomalyReport, InsightsError> {
    config.validate()?;
    if records.is_empty() {
        return Err(InsightsError::EmptyInput {
            operation: "anomaly detection",
        });
    }
    if records.len() < config.min_points {
        return Err(InsightsError::InsufficientData {
            required: config.min_points,
            actual: records.len(),
        });
    }

    let costs: Vec<f64> = records
        .iter()
        .map(|record| record.total_cost.to_f64().unwrap_or(0.0))
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let count_f = costs.len() as f64;
    let mean = costs.iter().sum::<f64>() / count_f;
    let variance_sum: f64 = costs
        .iter()
        .map(|cost| {
            let diff = cost - mean;
            diff * diff
        })
        .sum();
    let stddev = (variance_sum / count_f).sqrt();

    let mut anomalies = Vec::new();
    if stddev > f64::EPSILON {
        for (record, cost) in records.iter().zip(&costs) {
            let score = (cost - mean).abs() / stddev;
            if score >= config.threshold_sigma {
                anomalies.push(CostAnomaly {
                    record_id: record.id,
                    execution_id: record.execution_id.clone(),
                    cost: record.total_cost,
                    score,
                    severity: severity_for(score, config.threshold_sigma),
                });
            }
        }
    }

    anomalies.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });

    #[allow(clippy::cast_precision_loss)]
    let flagged = anomalies.len() as f64;
    Ok(AnomalyReport {
        anomalies,
        total_points: records.len(),
        anomaly_rate: flagged / count_f,
        threshold_sigma: config.threshold_sigma,
        mean_cost: mean,
        stddev_cost: stddev,
    })
}

const fn severity_for(score: f64, threshold: f64) -> AnomalySeverity {
    if score >= threshold * CRITICAL_FACTOR {
        AnomalySeverity::Critical
    } else if score >= threshold * HIGH_FACTOR {
        AnomalySeverity::High
    } else {
        AnomalySeverity::Moderate
    }
}
