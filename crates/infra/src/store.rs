//! Persistence boundary for every record the service owns.
//!
//! Handlers talk to `dyn Store`; the in-memory and Postgres backends must
//! behave identically, including uniqueness checks. Listings are returned
//! newest first unless noted otherwise.

use std::sync::Arc;

use thiserror::Error;

use railparcel_auth::{Admin, User};
use railparcel_core::{AdminId, MessageId, ParcelId, StationId, UserId};
use railparcel_messaging::Message;
use railparcel_parcels::Parcel;
use railparcel_stations::Station;

/// Storage operation error.
///
/// These are infrastructure errors; domain validation happens before a
/// record reaches the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A row targeted by an update or delete does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique key (station code, email, tracking number, ...) is taken.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository over stations, accounts, parcels and messages.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Stations, ordered by name.
    async fn list_stations(&self) -> StoreResult<Vec<Station>>;
    async fn get_station(&self, id: StationId) -> StoreResult<Option<Station>>;
    async fn find_station_by_code(&self, code: &str) -> StoreResult<Option<Station>>;
    async fn insert_station(&self, station: &Station) -> StoreResult<()>;
    async fn update_station(&self, station: &Station) -> StoreResult<()>;
    async fn delete_station(&self, id: StationId) -> StoreResult<()>;

    // Users.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn list_users_by_station(&self, station_id: StationId) -> StoreResult<Vec<User>>;
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    /// Persists every field, including the pending OTP challenge.
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, id: UserId) -> StoreResult<()>;

    // Administrators.
    async fn count_admins(&self) -> StoreResult<u64>;
    async fn get_admin(&self, id: AdminId) -> StoreResult<Option<Admin>>;
    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>>;
    async fn insert_admin(&self, admin: &Admin) -> StoreResult<()>;
    async fn update_admin(&self, admin: &Admin) -> StoreResult<()>;

    // Parcels.
    async fn list_parcels(&self) -> StoreResult<Vec<Parcel>>;
    /// Parcels sent from or addressed to `station_id`.
    async fn list_parcels_by_station(&self, station_id: StationId) -> StoreResult<Vec<Parcel>>;
    async fn get_parcel(&self, id: ParcelId) -> StoreResult<Option<Parcel>>;
    async fn find_parcel_by_tracking(&self, tracking_number: &str) -> StoreResult<Option<Parcel>>;
    /// Fails with `Conflict` when the tracking number is taken.
    async fn insert_parcel(&self, parcel: &Parcel) -> StoreResult<()>;
    async fn update_parcel(&self, parcel: &Parcel) -> StoreResult<()>;
    async fn delete_parcel(&self, id: ParcelId) -> StoreResult<()>;

    // Messages.
    async fn list_messages(&self) -> StoreResult<Vec<Message>>;
    /// Messages sent from or addressed to `station_id`.
    async fn list_messages_by_station(&self, station_id: StationId) -> StoreResult<Vec<Message>>;
    async fn list_unread_messages(&self, station_id: StationId) -> StoreResult<Vec<Message>>;
    /// Oldest first, so a parcel's history reads top to bottom.
    async fn list_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<Vec<Message>>;
    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>>;
    async fn insert_message(&self, message: &Message) -> StoreResult<()>;
    async fn update_message(&self, message: &Message) -> StoreResult<()>;
    async fn delete_message(&self, id: MessageId) -> StoreResult<()>;
    /// Returns the number of rows removed.
    async fn delete_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<u64>;
    /// Removes rows sent from or addressed to `station_id`. Returns the count.
    async fn delete_messages_by_station(&self, station_id: StationId) -> StoreResult<u64>;

    /// Insert fan-out rows one at a time.
    ///
    /// Not atomic: rows written before a failure stay written.
    async fn insert_messages(&self, messages: &[Message]) -> StoreResult<usize> {
        for (written, message) in messages.iter().enumerate() {
            if let Err(e) = self.insert_message(message).await {
                tracing::error!(
                    written,
                    total = messages.len(),
                    parcel_id = %message.parcel_id,
                    error = %e,
                    "fan-out interrupted"
                );
                return Err(e);
            }
        }
        Ok(messages.len())
    }
}

pub type SharedStore = Arc<dyn Store>;
