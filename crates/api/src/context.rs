use railparcel_auth::{AuthzError, Permission, Principal, PrincipalId, PrincipalKind, Role};
use railparcel_core::{AdminId, StationId, UserId};

/// Authenticated principal for a request.
///
/// Inserted by the auth middleware after the token and the account behind it
/// have been checked; immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal.principal_id
    }

    pub fn kind(&self) -> PrincipalKind {
        self.principal.kind
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn is_admin(&self) -> bool {
        self.principal.kind == PrincipalKind::Admin
    }

    pub fn user_id(&self) -> Option<UserId> {
        (self.principal.kind == PrincipalKind::User).then(|| self.principal.principal_id.as_user_id())
    }

    pub fn admin_id(&self) -> Option<AdminId> {
        self.is_admin().then(|| self.principal.principal_id.as_admin_id())
    }

    /// Station the caller acts for; administrators have none.
    pub fn station(&self) -> Result<StationId, AuthzError> {
        self.principal.require_station()
    }

    pub fn can(&self, permission: &Permission) -> bool {
        self.principal.can(permission)
    }
}
