use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use railparcel_core::{DomainError, DomainResult};

/// Role identifier used for RBAC.
///
/// Roles stay opaque strings at this layer; the API maps them to permissions.
/// Station users are `user` or `master`; administrators always carry `admin`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const USER: Role = Role(Cow::Borrowed("user"));
    pub const MASTER: Role = Role(Cow::Borrowed("master"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a role that may be held by a station user.
    pub fn parse_station_role(s: &str) -> DomainResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::USER),
            "master" => Ok(Self::MASTER),
            _ => Err(DomainError::validation("role must be one of: user, master")),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
