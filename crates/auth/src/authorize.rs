use std::collections::HashSet;

use thiserror::Error;

use railparcel_core::StationId;

use crate::{Permission, PrincipalId, PrincipalKind, Role};

/// A fully resolved principal for authorization decisions.
///
/// Built by the API from verified claims plus the role policy; carries no IO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub kind: PrincipalKind,
    pub station_id: Option<StationId>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("a station-bound account is required")]
    NoStation,
}

impl Principal {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The station this principal acts for, if it is station-bound.
    pub fn require_station(&self) -> Result<StationId, AuthzError> {
        self.station_id.ok_or(AuthzError::NoStation)
    }

    pub fn can(&self, required: &Permission) -> bool {
        authorize(self, required).is_ok()
    }
}

/// Authorize a principal against a single permission.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
