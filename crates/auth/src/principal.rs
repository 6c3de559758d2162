use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use railparcel_core::{AdminId, UserId};

/// Identity of an authenticated principal (station user or administrator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_user_id(&self) -> UserId {
        UserId::from_uuid(self.0)
    }

    pub fn as_admin_id(&self) -> AdminId {
        AdminId::from_uuid(self.0)
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<UserId> for PrincipalId {
    fn from(value: UserId) -> Self {
        Self(value.into())
    }
}

impl From<AdminId> for PrincipalId {
    fn from(value: AdminId) -> Self {
        Self(value.into())
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Which account table a principal lives in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Admin,
}
