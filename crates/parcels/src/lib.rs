//! Parcels domain module.
//!
//! Parcel records, the status lifecycle and tracking numbers, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod parcel;
pub mod tracking;

pub use parcel::{NewParcel, Parcel, ParcelStatus, ParcelTracking};
pub use tracking::{TRACKING_PREFIX, generate_tracking_number, is_tracking_number};
