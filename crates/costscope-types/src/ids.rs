//! Type-safe identifier wrappers for the four attribution scopes.
//!
//! Scope identifiers (`ExecutionId`, `AgentId`, `WorkflowId`, `TenantId`)
//! arrive from external orchestration systems as opaque strings, so they
//! wrap [`String`] rather than [`Uuid`]. The strong typing exists to prevent
//! accidental mixing of scope levels at compile time -- an execution ID can
//! never be passed where a tenant ID is expected.
//!
//! [`CostRecordId`] is the one engine-minted identifier; it uses UUID v7
//! (time-ordered) so downstream stores can index cost records efficiently.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] for externally-minted
/// scope identifiers.
macro_rules! define_scope_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_scope_id! {
    /// Identifier for one top-level unit of work (a single LLM call or
    /// request). Groups the line items of one call.
    ExecutionId
}

define_scope_id! {
    /// Identifier for the agent that issued the usage.
    AgentId
}

define_scope_id! {
    /// Identifier for the workflow an execution belongs to, when the
    /// orchestrator runs executions inside workflows.
    WorkflowId
}

define_scope_id! {
    /// Identifier for the tenant (customer or organizational unit) that
    /// owns the usage.
    TenantId
}

/// Unique identifier for a calculated cost record.
///
/// Minted by the engine at calculation time; UUID v7 keeps record IDs
/// time-ordered for downstream indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CostRecordId(pub Uuid);

impl CostRecordId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CostRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CostRecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CostRecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<CostRecordId> for Uuid {
    fn from(id: CostRecordId) -> Self {
        id.0
    }
}
