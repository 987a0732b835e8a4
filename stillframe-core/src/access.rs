//! Caller identity and permission checks.
//!
//! Every externally reachable surface (stuck view, backfill, secret config
//! accessors) takes a [`Principal`] and checks the required permission at call
//! time. There is no ambient privilege: the dispatch worker runs under its own
//! service principal rather than elevating the caller's.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An authenticated caller with its effective permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identity of the caller (token name, user id, service name).
    pub subject: String,
    /// Effective permissions (name -> granted).
    pub permissions: HashMap<String, bool>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            permissions: HashMap::new(),
        }
    }

    /// Grant a permission, builder style.
    pub fn grant(mut self, permission: &str) -> Self {
        self.permissions.insert(permission.to_string(), true);
        self
    }

    /// Check whether the principal holds a specific permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.get(permission).copied().unwrap_or(false)
    }

    /// Check whether the principal holds all of the given permissions.
    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has_permission(p))
    }

    /// Internal identity the dispatch worker and audit loop run under.
    ///
    /// Carries exactly the capabilities the background tasks need; it is never
    /// handed to external callers.
    pub fn dispatch_service() -> Self {
        Self::new("stillframe-dispatch")
            .grant(permissions::CONFIG_SECRETS)
            .grant(permissions::MAINTENANCE_VIEW)
    }
}

/// Well-known permission constants
pub mod permissions {
    // Pipeline surfaces
    pub const PIPELINE_REPORT: &str = "pipeline:report";

    // Maintenance surfaces
    pub const MAINTENANCE_VIEW: &str = "maintenance:view";
    pub const MAINTENANCE_BACKFILL: &str = "maintenance:backfill";

    // Config capabilities
    pub const CONFIG_SECRETS: &str = "config:secrets";
}
