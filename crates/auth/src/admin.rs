//! System administrator accounts.
//!
//! Administrators manage stations and users but are not bound to a station,
//! so they never take part in parcel or message flows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use railparcel_core::{AdminId, DomainResult, Entity, require_non_empty};

use crate::otp::{self, OtpChallenge, OtpError};
use crate::user::normalize_email;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: AdminId,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub otp: Option<OtpChallenge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Admin {
    type Id = AdminId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    pub email: String,
}

impl NewAdmin {
    pub fn into_admin(self, now: DateTime<Utc>) -> DomainResult<Admin> {
        Ok(Admin {
            id: AdminId::new(),
            username: require_non_empty("username", &self.username)?,
            email: normalize_email(&self.email)?,
            otp: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Admin {
    pub fn issue_otp(&mut self, now: DateTime<Utc>, ttl: Duration) -> &OtpChallenge {
        self.updated_at = now;
        self.otp.insert(OtpChallenge::issue(now, ttl))
    }

    pub fn verify_otp(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        otp::verify(self.otp.as_ref(), code, now)?;
        self.otp = None;
        self.updated_at = now;
        Ok(())
    }
}
