//! Station user accounts.
//!
//! A user belongs to exactly one station and logs in with an emailed (or
//! texted) one-time code. Roles are limited to `user` and `master`;
//! administrators live in [`crate::admin`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use railparcel_core::{DomainError, DomainResult, Entity, StationId, UserId, require_non_empty};

use crate::otp::{self, OtpChallenge, OtpError};
use crate::Role;

/// Station user account.
///
/// # Invariants
/// - `email` is trimmed, lower-cased and contains an `@`.
/// - `role` is `user` or `master`.
/// - `otp` is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub station_id: StationId,
    pub role: Role,
    #[serde(skip)]
    pub otp: Option<OtpChallenge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub station_id: StationId,
    pub role: Option<String>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub station_id: Option<StationId>,
    pub role: Option<String>,
}

/// Normalize and check an email address.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.contains('@') => Ok(email),
        _ => Err(DomainError::validation("invalid email format")),
    }
}

/// Blank phone numbers are treated as absent.
pub fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string)
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>) -> DomainResult<User> {
        let role = match self.role.as_deref() {
            Some(r) => Role::parse_station_role(r)?,
            None => Role::USER,
        };
        Ok(User {
            id: UserId::new(),
            name: require_non_empty("name", &self.name)?,
            email: normalize_email(&self.email)?,
            phone: normalize_phone(self.phone.as_deref()),
            station_id: self.station_id,
            role,
            otp: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl User {
    pub fn is_master(&self) -> bool {
        self.role == Role::MASTER
    }

    /// Apply a partial update. Validation happens before any field changes.
    pub fn apply(&mut self, patch: UserPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let name = patch.name.as_deref().map(|n| require_non_empty("name", n)).transpose()?;
        let email = patch.email.as_deref().map(normalize_email).transpose()?;
        let role = patch.role.as_deref().map(Role::parse_station_role).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(phone) = normalize_phone(patch.phone.as_deref()) {
            self.phone = Some(phone);
        }
        if let Some(station_id) = patch.station_id {
            self.station_id = station_id;
        }
        if let Some(role) = role {
            self.role = role;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Replace any pending challenge with a fresh one.
    pub fn issue_otp(&mut self, now: DateTime<Utc>, ttl: Duration) -> &OtpChallenge {
        self.updated_at = now;
        self.otp.insert(OtpChallenge::issue(now, ttl))
    }

    /// Verify a code; the challenge is consumed on success.
    pub fn verify_otp(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        otp::verify(self.otp.as_ref(), code, now)?;
        self.otp = None;
        self.updated_at = now;
        Ok(())
    }
}
