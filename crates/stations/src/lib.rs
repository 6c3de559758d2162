//! Stations domain module.
//!
//! Stations are the nodes of the railway network: parcels travel between
//! them and every message is addressed to one. At most one station is the
//! master station.

pub mod station;

pub use station::{NewStation, Station, StationPatch, StationSummary, ensure_single_master};
