//! `railparcel-auth`: identity, OTP login and authorization policy.
//!
//! Decoupled from HTTP and storage: callers load accounts, this crate decides.

pub mod admin;
pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod otp;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use admin::{Admin, NewAdmin};
pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtError, JwtValidator};
pub use otp::{OtpChallenge, OtpError};
pub use permissions::Permission;
pub use principal::{PrincipalId, PrincipalKind};
pub use roles::Role;
pub use user::{NewUser, User, UserPatch};
