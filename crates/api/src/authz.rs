//! API-side authorization guard.
//!
//! Handlers call [`require`] before touching the store, keeping the domain
//! crates and infra auth-agnostic.

use railparcel_auth::{AuthzError, Permission, Principal, PrincipalId, PrincipalKind, Role, authorize};
use railparcel_core::StationId;

use crate::context::PrincipalContext;

/// Check one permission for the current request.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(principal.principal(), permission)
}

/// Administrator-only surfaces (`/api/admin/*`).
pub fn require_admin(principal: &PrincipalContext) -> Result<(), AuthzError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("admin".to_string()))
    }
}

/// Resolve a principal from verified identity and current roles.
pub fn principal_for(
    principal_id: PrincipalId,
    kind: PrincipalKind,
    station_id: Option<StationId>,
    roles: Vec<Role>,
) -> Principal {
    let permissions = permissions_from_roles(&roles);
    Principal {
        principal_id,
        kind,
        station_id,
        roles,
        permissions,
    }
}

/// Role to permission mapping.
///
/// `admin` holds the wildcard. `master` extends `user` with network-wide
/// management and read-all rights.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| *r == Role::ADMIN) {
        return vec![Permission::WILDCARD];
    }

    let mut perms = Vec::new();
    if roles.iter().any(|r| *r == Role::USER || *r == Role::MASTER) {
        perms.extend([
            Permission::STATIONS_READ,
            Permission::PARCELS_READ,
            Permission::PARCELS_CREATE,
            Permission::PARCELS_UPDATE_STATUS,
            Permission::PARCELS_UPLOAD_IMAGE,
            Permission::MESSAGES_READ,
            Permission::MESSAGES_SEND,
        ]);
    }
    if roles.iter().any(|r| *r == Role::MASTER) {
        perms.extend([
            Permission::STATIONS_MANAGE,
            Permission::USERS_MANAGE,
            Permission::PARCELS_READ_ALL,
            Permission::PARCELS_DELETE,
            Permission::MESSAGES_READ_ALL,
            Permission::MESSAGES_DELETE_ANY,
        ]);
    }
    perms
}
