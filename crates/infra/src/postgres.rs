//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | SQLSTATE | `StoreError` |
//! |------------|----------|--------------|
//! | unique violation | `23505` | `Conflict` |
//! | foreign key violation | `23503` | `Conflict` |
//! | anything else | | `Backend` |
//!
//! The schema is created on startup with `CREATE TABLE IF NOT EXISTS`, so a
//! fresh database needs no separate migration step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use railparcel_auth::{Admin, OtpChallenge, Role, User};
use railparcel_core::{AdminId, MessageId, ParcelId, StationId, UserId};
use railparcel_messaging::Message;
use railparcel_parcels::{Parcel, ParcelStatus};
use railparcel_stations::Station;

use crate::store::{Store, StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stations (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        location TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        is_master BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT UNIQUE,
        station_id UUID NOT NULL REFERENCES stations(id),
        role TEXT NOT NULL,
        otp_code TEXT,
        otp_expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS admins (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        otp_code TEXT,
        otp_expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS parcels (
        id UUID PRIMARY KEY,
        tracking_number TEXT NOT NULL UNIQUE,
        sender_station_id UUID NOT NULL REFERENCES stations(id),
        receiver_station_id UUID NOT NULL REFERENCES stations(id),
        status TEXT NOT NULL,
        weight DOUBLE PRECISION,
        description TEXT,
        sender_name TEXT NOT NULL,
        receiver_name TEXT NOT NULL,
        sender_contact TEXT,
        receiver_contact TEXT,
        image_url TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id UUID PRIMARY KEY,
        from_station UUID NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
        to_station UUID NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
        parcel_id UUID NOT NULL REFERENCES parcels(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        read BOOLEAN NOT NULL DEFAULT FALSE,
        is_master_copied BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS messages_to_station_idx ON messages (to_station, read)",
    "CREATE INDEX IF NOT EXISTS messages_parcel_idx ON messages (parcel_id)",
];

/// Postgres store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn fetch_all<T>(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        decode: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Vec<T>> {
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter()
            .map(|r| decode(r).map_err(|e| map_sqlx_error(operation, e)))
            .collect()
    }

    async fn fetch_optional<T>(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        decode: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Option<T>> {
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref()
            .map(decode)
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Run a write and fail with `NotFound` when it touched no rows.
    async fn execute_one(
        &self,
        operation: &str,
        what: &'static str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> StoreResult<()> {
        let result = query
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(what));
        }
        Ok(())
    }
}

const STATION_COLUMNS: &str = "id, name, location, code, is_master, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, name, email, phone, station_id, role, otp_code, otp_expires_at, created_at, updated_at";
const ADMIN_COLUMNS: &str = "id, username, email, otp_code, otp_expires_at, created_at, updated_at";
const PARCEL_COLUMNS: &str = "id, tracking_number, sender_station_id, receiver_station_id, status, weight, \
     description, sender_name, receiver_name, sender_contact, receiver_contact, image_url, created_at, updated_at";
const MESSAGE_COLUMNS: &str =
    "id, from_station, to_station, parcel_id, content, read, is_master_copied, created_at, updated_at";

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations ORDER BY name ASC");
        self.fetch_all("list_stations", sqlx::query(&sql), station_from_row).await
    }

    async fn get_station(&self, id: StationId) -> StoreResult<Option<Station>> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = $1");
        self.fetch_optional("get_station", sqlx::query(&sql).bind(*id.as_uuid()), station_from_row)
            .await
    }

    async fn find_station_by_code(&self, code: &str) -> StoreResult<Option<Station>> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations WHERE code = $1");
        self.fetch_optional("find_station_by_code", sqlx::query(&sql).bind(code), station_from_row)
            .await
    }

    #[instrument(skip(self, station), fields(station_id = %station.id, code = %station.code), err)]
    async fn insert_station(&self, station: &Station) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stations (id, name, location, code, is_master, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*station.id.as_uuid())
        .bind(&station.name)
        .bind(&station.location)
        .bind(&station.code)
        .bind(station.is_master)
        .bind(station.created_at)
        .bind(station.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_station", e))?;
        Ok(())
    }

    async fn update_station(&self, station: &Station) -> StoreResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE stations
            SET name = $2, location = $3, code = $4, is_master = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(*station.id.as_uuid())
        .bind(&station.name)
        .bind(&station.location)
        .bind(&station.code)
        .bind(station.is_master)
        .bind(station.updated_at);
        self.execute_one("update_station", "station", query).await
    }

    async fn delete_station(&self, id: StationId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM stations WHERE id = $1").bind(*id.as_uuid());
        self.execute_one("delete_station", "station", query).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        self.fetch_all("list_users", sqlx::query(&sql), user_from_row).await
    }

    async fn list_users_by_station(&self, station_id: StationId) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE station_id = $1 ORDER BY created_at DESC, id DESC"
        );
        self.fetch_all(
            "list_users_by_station",
            sqlx::query(&sql).bind(*station_id.as_uuid()),
            user_from_row,
        )
        .await
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_optional("get_user", sqlx::query(&sql).bind(*id.as_uuid()), user_from_row)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.fetch_optional("find_user_by_email", sqlx::query(&sql).bind(email), user_from_row)
            .await
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        self.fetch_optional("find_user_by_phone", sqlx::query(&sql).bind(phone), user_from_row)
            .await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, station_id, role, otp_code, otp_expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(*user.station_id.as_uuid())
        .bind(user.role.as_str())
        .bind(user.otp.as_ref().map(|c| c.code.clone()))
        .bind(user.otp.as_ref().map(|c| c.expires_at))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, phone = $4, station_id = $5, role = $6,
                otp_code = $7, otp_expires_at = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(*user.station_id.as_uuid())
        .bind(user.role.as_str())
        .bind(user.otp.as_ref().map(|c| c.code.clone()))
        .bind(user.otp.as_ref().map(|c| c.expires_at))
        .bind(user.updated_at);
        self.execute_one("update_user", "user", query).await
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM users WHERE id = $1").bind(*id.as_uuid());
        self.execute_one("delete_user", "user", query).await
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM admins")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_admins", e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("count_admins", e))?;
        Ok(total.max(0) as u64)
    }

    async fn get_admin(&self, id: AdminId) -> StoreResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1");
        self.fetch_optional("get_admin", sqlx::query(&sql).bind(*id.as_uuid()), admin_from_row)
            .await
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE email = $1");
        self.fetch_optional("find_admin_by_email", sqlx::query(&sql).bind(email), admin_from_row)
            .await
    }

    async fn insert_admin(&self, admin: &Admin) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admins (id, username, email, otp_code, otp_expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*admin.id.as_uuid())
        .bind(&admin.username)
        .bind(&admin.email)
        .bind(admin.otp.as_ref().map(|c| c.code.clone()))
        .bind(admin.otp.as_ref().map(|c| c.expires_at))
        .bind(admin.created_at)
        .bind(admin.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_admin", e))?;
        Ok(())
    }

    async fn update_admin(&self, admin: &Admin) -> StoreResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE admins
            SET username = $2, email = $3, otp_code = $4, otp_expires_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(*admin.id.as_uuid())
        .bind(&admin.username)
        .bind(&admin.email)
        .bind(admin.otp.as_ref().map(|c| c.code.clone()))
        .bind(admin.otp.as_ref().map(|c| c.expires_at))
        .bind(admin.updated_at);
        self.execute_one("update_admin", "admin", query).await
    }

    async fn list_parcels(&self) -> StoreResult<Vec<Parcel>> {
        let sql = format!("SELECT {PARCEL_COLUMNS} FROM parcels ORDER BY created_at DESC, id DESC");
        self.fetch_all("list_parcels", sqlx::query(&sql), parcel_from_row).await
    }

    async fn list_parcels_by_station(&self, station_id: StationId) -> StoreResult<Vec<Parcel>> {
        let sql = format!(
            "SELECT {PARCEL_COLUMNS} FROM parcels \
             WHERE sender_station_id = $1 OR receiver_station_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_all(
            "list_parcels_by_station",
            sqlx::query(&sql).bind(*station_id.as_uuid()),
            parcel_from_row,
        )
        .await
    }

    async fn get_parcel(&self, id: ParcelId) -> StoreResult<Option<Parcel>> {
        let sql = format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE id = $1");
        self.fetch_optional("get_parcel", sqlx::query(&sql).bind(*id.as_uuid()), parcel_from_row)
            .await
    }

    async fn find_parcel_by_tracking(&self, tracking_number: &str) -> StoreResult<Option<Parcel>> {
        let sql = format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE tracking_number = $1");
        self.fetch_optional(
            "find_parcel_by_tracking",
            sqlx::query(&sql).bind(tracking_number),
            parcel_from_row,
        )
        .await
    }

    #[instrument(skip(self, parcel), fields(parcel_id = %parcel.id, tracking = %parcel.tracking_number), err)]
    async fn insert_parcel(&self, parcel: &Parcel) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parcels (
                id, tracking_number, sender_station_id, receiver_station_id, status, weight,
                description, sender_name, receiver_name, sender_contact, receiver_contact,
                image_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(*parcel.id.as_uuid())
        .bind(&parcel.tracking_number)
        .bind(*parcel.sender_station_id.as_uuid())
        .bind(*parcel.receiver_station_id.as_uuid())
        .bind(parcel.status.as_str())
        .bind(parcel.weight)
        .bind(&parcel.description)
        .bind(&parcel.sender_name)
        .bind(&parcel.receiver_name)
        .bind(&parcel.sender_contact)
        .bind(&parcel.receiver_contact)
        .bind(&parcel.image_url)
        .bind(parcel.created_at)
        .bind(parcel.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_parcel", e))?;
        Ok(())
    }

    async fn update_parcel(&self, parcel: &Parcel) -> StoreResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE parcels
            SET status = $2, weight = $3, description = $4, sender_name = $5, receiver_name = $6,
                sender_contact = $7, receiver_contact = $8, image_url = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(*parcel.id.as_uuid())
        .bind(parcel.status.as_str())
        .bind(parcel.weight)
        .bind(&parcel.description)
        .bind(&parcel.sender_name)
        .bind(&parcel.receiver_name)
        .bind(&parcel.sender_contact)
        .bind(&parcel.receiver_contact)
        .bind(&parcel.image_url)
        .bind(parcel.updated_at);
        self.execute_one("update_parcel", "parcel", query).await
    }

    async fn delete_parcel(&self, id: ParcelId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM parcels WHERE id = $1").bind(*id.as_uuid());
        self.execute_one("delete_parcel", "parcel", query).await
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at DESC, id DESC");
        self.fetch_all("list_messages", sqlx::query(&sql), message_from_row).await
    }

    async fn list_messages_by_station(&self, station_id: StationId) -> StoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE from_station = $1 OR to_station = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_all(
            "list_messages_by_station",
            sqlx::query(&sql).bind(*station_id.as_uuid()),
            message_from_row,
        )
        .await
    }

    async fn list_unread_messages(&self, station_id: StationId) -> StoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE to_station = $1 AND read = FALSE \
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_all(
            "list_unread_messages",
            sqlx::query(&sql).bind(*station_id.as_uuid()),
            message_from_row,
        )
        .await
    }

    async fn list_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE parcel_id = $1 ORDER BY created_at ASC, id ASC"
        );
        self.fetch_all(
            "list_messages_by_parcel",
            sqlx::query(&sql).bind(*parcel_id.as_uuid()),
            message_from_row,
        )
        .await
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        self.fetch_optional("get_message", sqlx::query(&sql).bind(*id.as_uuid()), message_from_row)
            .await
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, from_station, to_station, parcel_id, content, read, is_master_copied, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*message.id.as_uuid())
        .bind(*message.from_station.as_uuid())
        .bind(*message.to_station.as_uuid())
        .bind(*message.parcel_id.as_uuid())
        .bind(&message.content)
        .bind(message.read)
        .bind(message.is_master_copied)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_message", e))?;
        Ok(())
    }

    async fn update_message(&self, message: &Message) -> StoreResult<()> {
        let query = sqlx::query("UPDATE messages SET content = $2, read = $3, updated_at = $4 WHERE id = $1")
            .bind(*message.id.as_uuid())
            .bind(&message.content)
            .bind(message.read)
            .bind(message.updated_at);
        self.execute_one("update_message", "message", query).await
    }

    async fn delete_message(&self, id: MessageId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM messages WHERE id = $1").bind(*id.as_uuid());
        self.execute_one("delete_message", "message", query).await
    }

    async fn delete_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE parcel_id = $1")
            .bind(*parcel_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_messages_by_parcel", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_messages_by_station(&self, station_id: StationId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE from_station = $1 OR to_station = $1")
            .bind(*station_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_messages_by_station", e))?;
        Ok(result.rows_affected())
    }
}

// Row decoding

fn station_from_row(row: &PgRow) -> Result<Station, sqlx::Error> {
    Ok(Station {
        id: StationId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        code: row.try_get("code")?,
        is_master: row.try_get("is_master")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn otp_from_row(row: &PgRow) -> Result<Option<OtpChallenge>, sqlx::Error> {
    let code: Option<String> = row.try_get("otp_code")?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("otp_expires_at")?;
    Ok(match (code, expires_at) {
        (Some(code), Some(expires_at)) => Some(OtpChallenge { code, expires_at }),
        _ => None,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        station_id: StationId::from_uuid(row.try_get("station_id")?),
        role: Role::new(role),
        otp: otp_from_row(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn admin_from_row(row: &PgRow) -> Result<Admin, sqlx::Error> {
    Ok(Admin {
        id: AdminId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        otp: otp_from_row(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parcel_from_row(row: &PgRow) -> Result<Parcel, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = ParcelStatus::parse(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Parcel {
        id: ParcelId::from_uuid(row.try_get("id")?),
        tracking_number: row.try_get("tracking_number")?,
        sender_station_id: StationId::from_uuid(row.try_get("sender_station_id")?),
        receiver_station_id: StationId::from_uuid(row.try_get("receiver_station_id")?),
        status,
        weight: row.try_get("weight")?,
        description: row.try_get("description")?,
        sender_name: row.try_get("sender_name")?,
        receiver_name: row.try_get("receiver_name")?,
        sender_contact: row.try_get("sender_contact")?,
        receiver_contact: row.try_get("receiver_contact")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, sqlx::Error> {
    Ok(Message {
        id: MessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
        from_station: StationId::from_uuid(row.try_get("from_station")?),
        to_station: StationId::from_uuid(row.try_get("to_station")?),
        parcel_id: ParcelId::from_uuid(row.try_get("parcel_id")?),
        content: row.try_get("content")?,
        read: row.try_get("read")?,
        is_master_copied: row.try_get("is_master_copied")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Map SQLx errors to `StoreError`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(
                    db_err
                        .constraint()
                        .map(|c| format!("{c} already exists"))
                        .unwrap_or(msg),
                ),
                // Foreign key violation: the row is still referenced.
                Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        map_sqlx_error("query", err)
    }
}
