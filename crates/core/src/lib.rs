//! `railparcel-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and the `Entity` trait. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{require_non_empty, DomainError, DomainResult};
pub use id::{AdminId, MessageId, ParcelId, StationId, UserId};
