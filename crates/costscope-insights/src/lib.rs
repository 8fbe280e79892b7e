//! Budget evaluation and cost anomaly detection over Costscope output.
//!
//! The engine produces cost records and attributions; this crate answers
//! two operational questions about them:
//!
//! - [`budget`] -- how close is each scope to its spend cap, and has it
//!   crossed a warning, critical, or exceeded threshold?
//! - [`anomaly`] -- which individual records look statistically out of
//!   line with the rest of their batch?
//!
//! Both passes are pure functions over their inputs. Nothing here talks
//! to storage or the network, and nothing fires actions: callers decide
//! what a status or a flag means operationally.
//!
//! # Example
//!
//! ```
//! use costscope_insights::{BudgetPolicy, BudgetScope, evaluate};
//! use costscope_types::Currency;
//! use rust_decimal::Decimal;
//!
//! let policy = BudgetPolicy::new(
//!     "monthly-cap",
//!     BudgetScope::Global,
//!     Decimal::new(100, 0),
//!     Currency::Usd,
//! );
//! let statuses = evaluate(&[policy], &[]);
//! assert_eq!(statuses.map(|s| s.len()), Ok(1));
//! ```

pub mod anomaly;
pub mod budget;
pub mod error;

// Re-export primary types at crate root.
pub use anomaly::{AnomalyDetectorConfig, AnomalyReport, AnomalySeverity, CostAnomaly, detect};
pub use budget::{BudgetPolicy, BudgetScope, BudgetSeverity, BudgetStatus, evaluate};
pub use error::InsightsError;
