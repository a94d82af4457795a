//! # Access Policy
//!
//! Role to permission mapping used to gate module reads and writes.
//!
//! A denial never names the missing permission: callers learn only that
//! access was refused.

use crate::HubError;
use std::collections::{BTreeMap, BTreeSet};

/// Permission granting everything.
pub const WILDCARD: &str = "*";

/// Which permissions each role holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    roles: BTreeMap<String, BTreeSet<String>>,
}

impl AccessPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role a set of permissions, extending what it already holds.
    #[must_use]
    pub fn grant(mut self, role: &str, permissions: &[&str]) -> Self {
        self.roles
            .entry(role.to_string())
            .or_default()
            .extend(permissions.iter().map(|p| p.to_string()));
        self
    }

    /// Roles of a law practice.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .grant("admin", &[WILDCARD])
            .grant(
                "attorney",
                &[
                    "client.read",
                    "client.write",
                    "case.read",
                    "case.write",
                    "document.read",
                    "document.write",
                    "research.read",
                    "research.write",
                    "workflow.read",
                    "workflow.write",
                    "ai.use",
                    "entity.read",
                    "entity.write",
                ],
            )
            .grant(
                "paralegal",
                &[
                    "client.read",
                    "case.read",
                    "document.read",
                    "document.write",
                    "research.read",
                    "workflow.read",
                    "workflow.write",
                    "ai.use",
                ],
            )
            .grant("client", &["client.read", "case.read", "document.read"])
            .grant(
                "it",
                &["integration.read", "integration.write", "entity.read"],
            )
    }

    #[must_use]
    pub fn has(&self, role: &str, permission: &str) -> bool {
        self.roles
            .get(role)
            .is_some_and(|held| held.contains(WILDCARD) || held.contains(permission))
    }

    /// Whether `role` holds every permission in `required`.
    #[must_use]
    pub fn allows(&self, role: &str, required: &[String]) -> bool {
        required.iter().all(|p| self.has(role, p))
    }

    /// Fail with a generic `PermissionDenied` unless `role` holds every
    /// permission in `required`.
    pub fn check(&self, role: &str, required: &[String]) -> Result<(), HubError> {
        if self.allows(role, required) {
            Ok(())
        } else {
            tracing::debug!(role, "access denied");
            Err(HubError::PermissionDenied)
        }
    }

    /// Known role names.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}
