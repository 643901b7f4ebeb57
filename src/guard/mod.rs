//! Existence checks for resources that must not collide with out-of-band
//! pre-existing instances (log groups keyed by path-like names).
//!
//! Implementations own their environment handle; the builder only sees the
//! trait. What happens on a failed lookup is a declared policy, not inline
//! conditional logic: conservative (abort the pass, the default) or
//! optimistic (assume absent and let the emitter surface any conflict).

use crate::core::error::{BuildError, BuildResult};
use crate::core::graph::ResourceKind;
use std::collections::HashMap;

/// Outcome of one existence lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Found,
    NotFound,
    LookupFailed(String),
}

/// What to do when a lookup fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupPolicy {
    /// Treat a failed lookup as absent. May surface a duplicate-creation
    /// conflict later, at emit time.
    Optimistic,
    /// Abort the build pass. The whole pass is safe to retry.
    #[default]
    Conservative,
}

impl Existence {
    /// Apply the policy: does the resource already exist?
    pub fn resolve(self, policy: LookupPolicy, kind: ResourceKind, name: &str) -> BuildResult<bool> {
        match self {
            Self::Found => Ok(true),
            Self::NotFound => Ok(false),
            Self::LookupFailed(reason) => match policy {
                LookupPolicy::Optimistic => Ok(false),
                LookupPolicy::Conservative => Err(BuildError::GuardLookup {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    reason,
                }),
            },
        }
    }
}

/// Queries the target environment for a resource of the given kind and name.
pub trait ExistenceGuard {
    fn check_exists(&self, kind: ResourceKind, logical_name: &str) -> Existence;
}

/// Offline guard: everything is absent. Used for local synthesis where the
/// emitter performs the authoritative diff anyway.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAbsent;

impl ExistenceGuard for AssumeAbsent {
    fn check_exists(&self, _kind: ResourceKind, _logical_name: &str) -> Existence {
        Existence::NotFound
    }
}

/// Guard backed by a fixed outcome table. Names not in the table are absent.
#[derive(Debug, Clone, Default)]
pub struct StaticGuard {
    outcomes: HashMap<String, Existence>,
}

impl StaticGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found(mut self, name: &str) -> Self {
        self.outcomes.insert(name.to_string(), Existence::Found);
        self
    }

    pub fn failing(mut self, name: &str, reason: &str) -> Self {
        self.outcomes
            .insert(name.to_string(), Existence::LookupFailed(reason.to_string()));
        self
    }
}

impl ExistenceGuard for StaticGuard {
    fn check_exists(&self, _kind: ResourceKind, logical_name: &str) -> Existence {
        self.outcomes
            .get(logical_name)
            .cloned()
            .unwrap_or(Existence::NotFound)
    }
}
