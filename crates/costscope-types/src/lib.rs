//! Shared type definitions for the Costscope usage-cost engine.
//!
//! This crate is the single source of truth for all types used across the
//! Costscope workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for billing dashboards and reporting frontends.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers for the four attribution scopes
//! - [`enums`] -- Enumeration types (currency, scope, normalization method)
//! - [`usage`] -- Raw and normalized usage records reported by providers
//! - [`pricing`] -- Pricing tables and the three pricing model shapes
//! - [`cost`] -- Calculated cost records with exact component costs
//! - [`attribution`] -- Scoped attributions, breakdowns, and the summary

pub mod attribution;
pub mod cost;
pub mod enums;
pub mod ids;
pub mod pricing;
pub mod usage;

// Re-export all public types at crate root for convenience.
pub use attribution::{
    AgentAttribution, Attribution, AttributionSummary, CostRanking, ExecutionAttribution,
    ScopeBreakdown, TenantAttribution, WorkflowAttribution, WorkflowBreakdown,
};
pub use cost::{CostRecord, MONEY_SCALE};
pub use enums::{Currency, NormalizationMethod, ScopeType};
pub use ids::{AgentId, CostRecordId, ExecutionId, TenantId, WorkflowId};
pub use pricing::{PricingModel, PricingTable, PricingTier};
pub use usage::{NormalizedUsage, UsageRecord};
