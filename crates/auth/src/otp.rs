//! One-time passcodes for passwordless login.
//!
//! A challenge is a 6-digit code with an absolute expiry, stored on the
//! account record. Verification is an exact string match against a
//! non-expired challenge; expiry is checked first.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a code.
pub const CODE_LENGTH: u32 = 6;

/// Default lifetime of a code.
pub const DEFAULT_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("no OTP has been requested; request a new OTP")]
    NotRequested,

    #[error("OTP has expired; request a new OTP")]
    Expired,

    #[error("invalid OTP")]
    Mismatch,
}

/// A pending login challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// Issue a fresh random challenge valid until `now + ttl`.
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            code: generate_code(),
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Uniformly random code in `10^(n-1) ..= 10^n - 1`, so it never has a leading zero.
pub fn generate_code() -> String {
    let min = 10u32.pow(CODE_LENGTH - 1);
    let max = 10u32.pow(CODE_LENGTH) - 1;
    rand::thread_rng().gen_range(min..=max).to_string()
}

/// Verify a provided code against the stored challenge.
pub fn verify(stored: Option<&OtpChallenge>, provided: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
    let challenge = stored.ok_or(OtpError::NotRequested)?;
    if challenge.is_expired(now) {
        return Err(OtpError::Expired);
    }
    if challenge.code != provided.trim() {
        return Err(OtpError::Mismatch);
    }
    Ok(())
}
