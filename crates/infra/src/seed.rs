//! Startup seeding: the bootstrap administrator and optional demo stations.

use chrono::{DateTime, Utc};

use railparcel_auth::{Admin, NewAdmin};
use railparcel_core::DomainError;
use railparcel_stations::{NewStation, Station};

use crate::store::{Store, StoreError, StoreResult};

/// Demo network: (code, name, location). None of them is the master.
pub const DEMO_STATIONS: &[(&str, &str, &str)] = &[
    ("CNB", "KANPUR CENTRAL JN.", "Kanpur"),
    ("DHN", "DHANBAD JN.", "Dhanbad"),
    ("DLI", "DELHI JN.", "Delhi"),
    ("GAYA", "GAYA JN.", "Gaya"),
    ("HWH", "HOWRAH JN.", "Howrah"),
    ("NDLS", "NEW DELHI", "New Delhi"),
];

fn invalid(e: DomainError) -> StoreError {
    StoreError::Backend(format!("invalid seed data: {e}"))
}

/// Create the first administrator when none exists.
///
/// Returns the created admin, or `None` when admins are already present.
pub async fn bootstrap_admin(
    store: &dyn Store,
    email: &str,
    username: &str,
    now: DateTime<Utc>,
) -> StoreResult<Option<Admin>> {
    if store.count_admins().await? > 0 {
        tracing::debug!("admins exist, skipping bootstrap");
        return Ok(None);
    }
    let admin = NewAdmin {
        username: username.to_string(),
        email: email.to_string(),
    }
    .into_admin(now)
    .map_err(invalid)?;
    store.insert_admin(&admin).await?;
    tracing::info!(admin_id = %admin.id, username = %admin.username, "bootstrap admin created");
    Ok(Some(admin))
}

/// Insert the demo stations into an empty store. Returns how many were created.
pub async fn seed_demo_stations(store: &dyn Store, now: DateTime<Utc>) -> StoreResult<usize> {
    if !store.list_stations().await?.is_empty() {
        tracing::debug!("stations exist, skipping demo seed");
        return Ok(0);
    }
    for (code, name, location) in DEMO_STATIONS {
        let station: Station = NewStation {
            name: name.to_string(),
            location: location.to_string(),
            code: code.to_string(),
            is_master: false,
        }
        .into_station(now)
        .map_err(invalid)?;
        store.insert_station(&station).await?;
    }
    tracing::info!(count = DEMO_STATIONS.len(), "demo stations created");
    Ok(DEMO_STATIONS.len())
}
