//! Enumeration types for the Costscope engine.
//!
//! Closed sets shared across the workspace: supported currencies, the four
//! attribution scopes, and the token-normalization methods.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// A currency a pricing table can be denominated in.
///
/// Closed enumeration: adding a currency is a deliberate schema change, not
/// a runtime configuration. Serialized as the uppercase ISO 4217 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export, export_to = "bindings/")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Euro.
    Eur,
    /// Pound sterling.
    Gbp,
    /// Japanese yen.
    Jpy,
}

impl Currency {
    /// Return the ISO 4217 code for this currency.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// Scope Type
// ---------------------------------------------------------------------------

/// The organizational scope an attribution aggregates over.
///
/// Scopes nest: every execution belongs to an agent, agents may run inside
/// workflows, and workflows belong to tenants. Workflow and tenant are
/// optional on a usage record; execution and agent are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ScopeType {
    /// One top-level unit of work (a single LLM call).
    Execution,
    /// All usage issued by one agent, across executions.
    Agent,
    /// All usage inside one workflow.
    Workflow,
    /// All usage owned by one tenant.
    Tenant,
}

impl ScopeType {
    /// Return the `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Agent => "agent",
            Self::Workflow => "workflow",
            Self::Tenant => "tenant",
        }
    }
}

impl core::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Normalization Method
// ---------------------------------------------------------------------------

/// The strategy the token normalizer applied to a usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NormalizationMethod {
    /// Identity passthrough: counts unchanged, factor 1.0. Used when no
    /// configuration exists for the provider/model.
    Raw,
    /// Per-field correction factors from a token-counting config.
    Factor,
    /// Character-count estimation against the 4.0 chars-per-token baseline.
    CharacterEstimate,
}

impl NormalizationMethod {
    /// Return the `snake_case` name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Factor => "factor",
            Self::CharacterEstimate => "character_estimate",
        }
    }
}

impl core::fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_serializes_as_iso_code() {
        let json = serde_json::to_string(&Currency::Usd).ok();
        assert_eq!(json.as_deref(), Some("\"USD\""));

        let restored: Result<Currency, _> = serde_json::from_str("\"EUR\"");
        assert_eq!(restored.ok(), Some(Currency::Eur));
    }

    #[test]
    fn currency_rejects_unknown_code() {
        let restored: Result<Currency, _> = serde_json::from_str("\"CHF\"");
        assert!(restored.is_err());
    }

    #[test]
    fn currency_display_matches_code() {
        assert_eq!(Currency::Jpy.to_string(), "JPY");
        assert_eq!(Currency::Gbp.code(), "GBP");
    }

    #[test]
    fn scope_type_serializes_snake_case() {
        let json = serde_json::to_string(&ScopeType::Execution).ok();
        assert_eq!(json.as_deref(), Some("\"execution\""));
        assert_eq!(ScopeType::Tenant.to_string(), "tenant");
    }

    #[test]
    fn normalization_method_wire_names() {
        assert_eq!(NormalizationMethod::Raw.as_str(), "raw");
        assert_eq!(NormalizationMethod::Factor.as_str(), "factor");
        assert_eq!(
            NormalizationMethod::CharacterEstimate.as_str(),
            "character_estimate"
        );

        let json = serde_json::to_string(&NormalizationMethod::CharacterEstimate).ok();
        assert_eq!(json.as_deref(), Some("\"character_estimate\""));
    }
}
