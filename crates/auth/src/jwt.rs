//! HS256 token codec.
//!
//! Claims carry RFC 3339 timestamps rather than numeric `exp`, so the library's
//! registered-claim checks are switched off and [`validate_claims`] runs instead.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use railparcel_core::StationId;

use crate::{JwtClaims, PrincipalId, PrincipalKind, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("malformed or badly signed token: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies bearer tokens.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// Shared-secret HS256 signer/validator.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Build claims for a principal valid from `now` for the configured lifetime.
    pub fn claims_for(
        &self,
        sub: PrincipalId,
        kind: PrincipalKind,
        station_id: Option<StationId>,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> JwtClaims {
        JwtClaims {
            sub,
            kind,
            station_id,
            roles,
            issued_at: now,
            expires_at: now + self.ttl,
        }
    }

    pub fn encode(&self, claims: &JwtClaims) -> Result<String, JwtError> {
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railparcel_core::UserId;

    fn codec(secret: &str) -> Hs256Jwt {
        Hs256Jwt::new(secret.as_bytes(), Duration::hours(24))
    }

    #[test]
    fn issued_token_validates() {
        let jwt = codec("secret");
        let now = Utc::now();
        let station = StationId::new();
        let claims = jwt.claims_for(
            UserId::new().into(),
            PrincipalKind::User,
            Some(station),
            vec![Role::USER],
            now,
        );
        let token = jwt.encode(&claims).unwrap();

        let decoded = jwt.validate(&token, now).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.station_id, Some(station));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let issuer = codec("secret");
        let claims = issuer.claims_for(UserId::new().into(), PrincipalKind::User, None, vec![], now);
        let token = issuer.encode(&claims).unwrap();

        let err = codec("other").validate(&token, now).unwrap_err();
        assert!(matches!(err, JwtError::Decode(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = codec("secret");
        let now = Utc::now();
        let claims = jwt.claims_for(UserId::new().into(), PrincipalKind::Admin, None, vec![Role::ADMIN], now);
        let token = jwt.encode(&claims).unwrap();

        let err = jwt.validate(&token, now + Duration::hours(25)).unwrap_err();
        assert!(matches!(err, JwtError::Claims(TokenValidationError::Expired)));
    }
}
