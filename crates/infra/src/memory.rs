//! In-memory store for development and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use railparcel_auth::{Admin, User};
use railparcel_core::{AdminId, MessageId, ParcelId, StationId, UserId};
use railparcel_messaging::Message;
use railparcel_parcels::Parcel;
use railparcel_stations::Station;

use crate::store::{Store, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    stations: HashMap<StationId, Station>,
    users: HashMap<UserId, User>,
    admins: HashMap<AdminId, Admin>,
    parcels: HashMap<ParcelId, Parcel>,
    messages: HashMap<MessageId, Message>,
}

/// `RwLock<HashMap>` tables with the same unique keys as the SQL schema.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> StoreResult<R> {
        let tables = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(f(&tables))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<R>) -> StoreResult<R> {
        let mut tables = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        f(&mut tables)
    }
}

fn newest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

fn check_station_unique(t: &Tables, s: &Station) -> StoreResult<()> {
    if t.stations.values().any(|o| o.id != s.id && o.code == s.code) {
        return Err(StoreError::Conflict(format!("station code {} already exists", s.code)));
    }
    Ok(())
}

fn check_user_unique(t: &Tables, u: &User) -> StoreResult<()> {
    for other in t.users.values().filter(|o| o.id != u.id) {
        if other.email == u.email {
            return Err(StoreError::Conflict(format!("user with email {} already exists", u.email)));
        }
        if u.phone.is_some() && other.phone == u.phone {
            return Err(StoreError::Conflict("user with this phone already exists".to_string()));
        }
    }
    Ok(())
}

fn check_admin_unique(t: &Tables, a: &Admin) -> StoreResult<()> {
    if t
        .admins
        .values()
        .any(|o| o.id != a.id && (o.email == a.email || o.username == a.username))
    {
        return Err(StoreError::Conflict("admin email or username already exists".to_string()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        self.read(|t| {
            let mut rows: Vec<Station> = t.stations.values().cloned().collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            rows
        })
    }

    async fn get_station(&self, id: StationId) -> StoreResult<Option<Station>> {
        self.read(|t| t.stations.get(&id).cloned())
    }

    async fn find_station_by_code(&self, code: &str) -> StoreResult<Option<Station>> {
        self.read(|t| t.stations.values().find(|s| s.code == code).cloned())
    }

    async fn insert_station(&self, station: &Station) -> StoreResult<()> {
        self.write(|t| {
            check_station_unique(t, station)?;
            t.stations.insert(station.id, station.clone());
            Ok(())
        })
    }

    async fn update_station(&self, station: &Station) -> StoreResult<()> {
        self.write(|t| {
            if !t.stations.contains_key(&station.id) {
                return Err(StoreError::NotFound("station"));
            }
            check_station_unique(t, station)?;
            t.stations.insert(station.id, station.clone());
            Ok(())
        })
    }

    async fn delete_station(&self, id: StationId) -> StoreResult<()> {
        self.write(|t| t.stations.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("station")))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.read(|t| newest_first(t.users.values().cloned().collect(), |u| (u.created_at, u.id)))
    }

    async fn list_users_by_station(&self, station_id: StationId) -> StoreResult<Vec<User>> {
        self.read(|t| {
            newest_first(
                t.users.values().filter(|u| u.station_id == station_id).cloned().collect(),
                |u| (u.created_at, u.id),
            )
        })
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.read(|t| t.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.read(|t| t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        self.read(|t| t.users.values().find(|u| u.phone.as_deref() == Some(phone)).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.write(|t| {
            check_user_unique(t, user)?;
            t.users.insert(user.id, user.clone());
            Ok(())
        })
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.write(|t| {
            if !t.users.contains_key(&user.id) {
                return Err(StoreError::NotFound("user"));
            }
            check_user_unique(t, user)?;
            t.users.insert(user.id, user.clone());
            Ok(())
        })
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        self.write(|t| t.users.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("user")))
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        self.read(|t| t.admins.len() as u64)
    }

    async fn get_admin(&self, id: AdminId) -> StoreResult<Option<Admin>> {
        self.read(|t| t.admins.get(&id).cloned())
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        self.read(|t| t.admins.values().find(|a| a.email == email).cloned())
    }

    async fn insert_admin(&self, admin: &Admin) -> StoreResult<()> {
        self.write(|t| {
            check_admin_unique(t, admin)?;
            t.admins.insert(admin.id, admin.clone());
            Ok(())
        })
    }

    async fn update_admin(&self, admin: &Admin) -> StoreResult<()> {
        self.write(|t| {
            if !t.admins.contains_key(&admin.id) {
                return Err(StoreError::NotFound("admin"));
            }
            check_admin_unique(t, admin)?;
            t.admins.insert(admin.id, admin.clone());
            Ok(())
        })
    }

    async fn list_parcels(&self) -> StoreResult<Vec<Parcel>> {
        self.read(|t| newest_first(t.parcels.values().cloned().collect(), |p| (p.created_at, p.id)))
    }

    async fn list_parcels_by_station(&self, station_id: StationId) -> StoreResult<Vec<Parcel>> {
        self.read(|t| {
            newest_first(
                t.parcels.values().filter(|p| p.involves(station_id)).cloned().collect(),
                |p| (p.created_at, p.id),
            )
        })
    }

    async fn get_parcel(&self, id: ParcelId) -> StoreResult<Option<Parcel>> {
        self.read(|t| t.parcels.get(&id).cloned())
    }

    async fn find_parcel_by_tracking(&self, tracking_number: &str) -> StoreResult<Option<Parcel>> {
        self.read(|t| t.parcels.values().find(|p| p.tracking_number == tracking_number).cloned())
    }

    async fn insert_parcel(&self, parcel: &Parcel) -> StoreResult<()> {
        self.write(|t| {
            if t.parcels.values().any(|p| p.tracking_number == parcel.tracking_number) {
                return Err(StoreError::Conflict(format!(
                    "tracking number {} already exists",
                    parcel.tracking_number
                )));
            }
            t.parcels.insert(parcel.id, parcel.clone());
            Ok(())
        })
    }

    async fn update_parcel(&self, parcel: &Parcel) -> StoreResult<()> {
        self.write(|t| match t.parcels.get_mut(&parcel.id) {
            Some(slot) => {
                *slot = parcel.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("parcel")),
        })
    }

    async fn delete_parcel(&self, id: ParcelId) -> StoreResult<()> {
        self.write(|t| t.parcels.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("parcel")))
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        self.read(|t| newest_first(t.messages.values().cloned().collect(), |m| (m.created_at, m.id)))
    }

    async fn list_messages_by_station(&self, station_id: StationId) -> StoreResult<Vec<Message>> {
        self.read(|t| {
            newest_first(
                t.messages.values().filter(|m| m.involves(station_id)).cloned().collect(),
                |m| (m.created_at, m.id),
            )
        })
    }

    async fn list_unread_messages(&self, station_id: StationId) -> StoreResult<Vec<Message>> {
        self.read(|t| {
            newest_first(
                t.messages
                    .values()
                    .filter(|m| m.to_station == station_id && !m.read)
                    .cloned()
                    .collect(),
                |m| (m.created_at, m.id),
            )
        })
    }

    async fn list_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<Vec<Message>> {
        self.read(|t| {
            let mut rows: Vec<Message> = t.messages.values().filter(|m| m.parcel_id == parcel_id).cloned().collect();
            rows.sort_by_key(|m| (m.created_at, m.id));
            rows
        })
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        self.read(|t| t.messages.get(&id).cloned())
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.write(|t| {
            t.messages.insert(message.id, message.clone());
            Ok(())
        })
    }

    async fn update_message(&self, message: &Message) -> StoreResult<()> {
        self.write(|t| match t.messages.get_mut(&message.id) {
            Some(slot) => {
                *slot = message.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("message")),
        })
    }

    async fn delete_message(&self, id: MessageId) -> StoreResult<()> {
        self.write(|t| t.messages.remove(&id).map(|_| ()).ok_or(StoreError::NotFound("message")))
    }

    async fn delete_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<u64> {
        self.write(|t| {
            let before = t.messages.len();
            t.messages.retain(|_, m| m.parcel_id != parcel_id);
            Ok((before - t.messages.len()) as u64)
        })
    }

    async fn delete_messages_by_station(&self, station_id: StationId) -> StoreResult<u64> {
        self.write(|t| {
            let before = t.messages.len();
            t.messages.retain(|_, m| !m.involves(station_id));
            Ok((before - t.messages.len()) as u64)
        })
    }
}
