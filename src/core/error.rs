//! Error taxonomy for the build pass.
//!
//! Every variant carries enough context (field, token, resource kind/name)
//! to diagnose a failure without re-running with tracing. A build pass either
//! fully succeeds or surfaces one of these — no partial graph is ever
//! returned.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// Missing or invalid required input. Fatal, not retried.
    #[error("configuration error in '{field}': {message}")]
    Configuration { field: String, message: String },

    /// Environment selector matched no named profile. Fatal, not retried.
    #[error("unknown environment '{name}' (available: {available})")]
    UnknownEnvironment { name: String, available: String },

    /// A placeholder-shaped token survived substitution. Indicates a
    /// packaging defect (template/context mismatch), not retried.
    #[error("unresolved placeholder '{token}' after rendering")]
    UnresolvedPlaceholder { token: String },

    /// External existence lookup failed under the conservative policy.
    /// Fatal for the current pass; the whole pass is safe to retry.
    #[error("existence lookup for {kind} '{name}' failed: {reason}")]
    GuardLookup {
        kind: String,
        name: String,
        reason: String,
    },

    /// Internal invariant violation. Always a programming defect.
    #[error("graph integrity violation: {message}")]
    GraphIntegrity { message: String },
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

impl BuildError {
    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::GraphIntegrity {
            message: message.into(),
        }
    }
}
