use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "parcels.create").
/// The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const STATIONS_READ: Permission = Permission(Cow::Borrowed("stations.read"));
    pub const STATIONS_MANAGE: Permission = Permission(Cow::Borrowed("stations.manage"));
    pub const USERS_MANAGE: Permission = Permission(Cow::Borrowed("users.manage"));
    pub const PARCELS_READ: Permission = Permission(Cow::Borrowed("parcels.read"));
    pub const PARCELS_READ_ALL: Permission = Permission(Cow::Borrowed("parcels.read_all"));
    pub const PARCELS_CREATE: Permission = Permission(Cow::Borrowed("parcels.create"));
    pub const PARCELS_UPDATE_STATUS: Permission = Permission(Cow::Borrowed("parcels.update_status"));
    pub const PARCELS_UPLOAD_IMAGE: Permission = Permission(Cow::Borrowed("parcels.upload_image"));
    pub const PARCELS_DELETE: Permission = Permission(Cow::Borrowed("parcels.delete"));
    pub const MESSAGES_READ: Permission = Permission(Cow::Borrowed("messages.read"));
    pub const MESSAGES_READ_ALL: Permission = Permission(Cow::Borrowed("messages.read_all"));
    pub const MESSAGES_SEND: Permission = Permission(Cow::Borrowed("messages.send"));
    pub const MESSAGES_DELETE_ANY: Permission = Permission(Cow::Borrowed("messages.delete_any"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
