use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use railparcel_api::app::{build_app_with, services::AppServices};
use railparcel_api::config::AppConfig;
use railparcel_auth::{Admin, JwtClaims, NewUser, PrincipalKind, User};
use railparcel_core::{AdminId, MessageId, ParcelId, StationId, UserId};
use railparcel_infra::{InMemoryStore, MemorySender, Store, StoreError, StoreResult};
use railparcel_messaging::Message;
use railparcel_parcels::Parcel;
use railparcel_stations::{NewStation, Station};

const JWT_SECRET: &str = "test-secret";

/// In-memory store that injects tracking-number collisions and message write failures.
#[derive(Default)]
struct FaultyStore {
    inner: InMemoryStore,
    /// Collisions still to report from `insert_parcel`.
    parcel_conflicts: AtomicUsize,
    tracking_tried: Mutex<Vec<String>>,
    /// 1-based `insert_message` call that fails; 0 never fails.
    fail_message_at: AtomicUsize,
    message_calls: AtomicUsize,
}

impl FaultyStore {
    fn tried(&self) -> Vec<String> {
        self.tracking_tried.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Store for FaultyStore {
    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        self.inner.list_stations().await
    }
    async fn get_station(&self, id: StationId) -> StoreResult<Option<Station>> {
        self.inner.get_station(id).await
    }
    async fn find_station_by_code(&self, code: &str) -> StoreResult<Option<Station>> {
        self.inner.find_station_by_code(code).await
    }
    async fn insert_station(&self, station: &Station) -> StoreResult<()> {
        self.inner.insert_station(station).await
    }
    async fn update_station(&self, station: &Station) -> StoreResult<()> {
        self.inner.update_station(station).await
    }
    async fn delete_station(&self, id: StationId) -> StoreResult<()> {
        self.inner.delete_station(id).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users().await
    }
    async fn list_users_by_station(&self, station_id: StationId) -> StoreResult<Vec<User>> {
        self.inner.list_users_by_station(station_id).await
    }
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_phone(phone).await
    }
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }
    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.inner.update_user(user).await
    }
    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        self.inner.delete_user(id).await
    }

    async fn count_admins(&self) -> StoreResult<u64> {
        self.inner.count_admins().await
    }
    async fn get_admin(&self, id: AdminId) -> StoreResult<Option<Admin>> {
        self.inner.get_admin(id).await
    }
    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        self.inner.find_admin_by_email(email).await
    }
    async fn insert_admin(&self, admin: &Admin) -> StoreResult<()> {
        self.inner.insert_admin(admin).await
    }
    async fn update_admin(&self, admin: &Admin) -> StoreResult<()> {
        self.inner.update_admin(admin).await
    }

    async fn list_parcels(&self) -> StoreResult<Vec<Parcel>> {
        self.inner.list_parcels().await
    }
    async fn list_parcels_by_station(&self, station_id: StationId) -> StoreResult<Vec<Parcel>> {
        self.inner.list_parcels_by_station(station_id).await
    }
    async fn get_parcel(&self, id: ParcelId) -> StoreResult<Option<Parcel>> {
        self.inner.get_parcel(id).await
    }
    async fn find_parcel_by_tracking(&self, tracking_number: &str) -> StoreResult<Option<Parcel>> {
        self.inner.find_parcel_by_tracking(tracking_number).await
    }
    async fn insert_parcel(&self, parcel: &Parcel) -> StoreResult<()> {
        self.tracking_tried.lock().unwrap().push(parcel.tracking_number.clone());
        let collide = self
            .parcel_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collide {
            return Err(StoreError::Conflict(format!("tracking number {} taken", parcel.tracking_number)));
        }
        self.inner.insert_parcel(parcel).await
    }
    async fn update_parcel(&self, parcel: &Parcel) -> StoreResult<()> {
        self.inner.update_parcel(parcel).await
    }
    async fn delete_parcel(&self, id: ParcelId) -> StoreResult<()> {
        self.inner.delete_parcel(id).await
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        self.inner.list_messages().await
    }
    async fn list_messages_by_station(&self, station_id: StationId) -> StoreResult<Vec<Message>> {
        self.inner.list_messages_by_station(station_id).await
    }
    async fn list_unread_messages(&self, station_id: StationId) -> StoreResult<Vec<Message>> {
        self.inner.list_unread_messages(station_id).await
    }
    async fn list_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<Vec<Message>> {
        self.inner.list_messages_by_parcel(parcel_id).await
    }
    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        self.inner.get_message(id).await
    }
    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        let call = self.message_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_message_at.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.insert_message(message).await
    }
    async fn update_message(&self, message: &Message) -> StoreResult<()> {
        self.inner.update_message(message).await
    }
    async fn delete_message(&self, id: MessageId) -> StoreResult<()> {
        self.inner.delete_message(id).await
    }
    async fn delete_messages_by_parcel(&self, parcel_id: ParcelId) -> StoreResult<u64> {
        self.inner.delete_messages_by_parcel(parcel_id).await
    }
    async fn delete_messages_by_station(&self, station_id: StationId) -> StoreResult<u64> {
        self.inner.delete_messages_by_station(station_id).await
    }
}

struct TestServer {
    base_url: String,
    store: Arc<FaultyStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(store: FaultyStore) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            public_url: base_url.clone(),
            upload_dir: std::env::temp_dir().join(format!("railparcel-test-{}", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        let store = Arc::new(store);
        let services = AppServices::new(store.clone(), Arc::new(MemorySender::new()), config);
        let app = build_app_with(Arc::new(services));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, store, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn station(store: &FaultyStore, code: &str, is_master: bool) -> Station {
    let station = NewStation {
        name: format!("{code} JN."),
        location: code.to_string(),
        code: code.to_string(),
        is_master,
    }
    .into_station(Utc::now())
    .unwrap();
    store.insert_station(&station).await.unwrap();
    station
}

/// CNB (master), DHN, GAYA and HWH, plus a booking clerk at DHN.
async fn seed(store: &FaultyStore) -> (User, Station) {
    station(store, "CNB", true).await;
    let dhn = station(store, "DHN", false).await;
    let gaya = station(store, "GAYA", false).await;
    station(store, "HWH", false).await;
    let clerk = NewUser {
        name: "Ravi".to_string(),
        email: "ravi@dhn.railway.in".to_string(),
        phone: None,
        station_id: dhn.id,
        role: Some("user".to_string()),
    }
    .into_user(Utc::now())
    .unwrap();
    store.insert_user(&clerk).await.unwrap();
    (clerk, gaya)
}

fn token_for(user: &User) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user.id.into(),
        kind: PrincipalKind::User,
        station_id: Some(user.station_id),
        roles: vec![user.role.clone()],
        issued_at: now - ChronoDuration::seconds(1),
        expires_at: now + ChronoDuration::minutes(10),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn book(srv: &TestServer, token: &str, receiver: &Station) -> reqwest::Response {
    reqwest::Client::new()
        .post(srv.url("/api/parcels"))
        .bearer_auth(token)
        .json(&json!({
            "receiver_station_id": receiver.id,
            "sender_name": "Ravi Kumar",
            "receiver_name": "Sita Devi",
            "initial_message": "Two cartons",
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn booking_retries_tracking_collisions_with_fresh_numbers() {
    let store = FaultyStore::default();
    store.parcel_conflicts.store(4, Ordering::SeqCst);
    let (clerk, gaya) = seed(&store).await;
    let srv = TestServer::spawn(store).await;

    let res = book(&srv, &token_for(&clerk), &gaya).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let parcel: Value = res.json().await.unwrap();

    let tried = srv.store.tried();
    assert_eq!(tried.len(), 5);
    let mut distinct = tried.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 5, "every attempt draws a fresh number: {tried:?}");
    assert_eq!(parcel["tracking_number"], json!(tried[4]));

    assert_eq!(srv.store.list_parcels().await.unwrap().len(), 1);
    assert_eq!(srv.store.list_messages().await.unwrap().len(), 4);
}

#[tokio::test]
async fn booking_gives_up_after_five_collisions() {
    for collisions in [5, 9] {
        let store = FaultyStore::default();
        store.parcel_conflicts.store(collisions, Ordering::SeqCst);
        let (clerk, gaya) = seed(&store).await;
        let srv = TestServer::spawn(store).await;

        let res = book(&srv, &token_for(&clerk), &gaya).await;
        assert_eq!(res.status(), StatusCode::CONFLICT, "{collisions} collisions");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "conflict");

        assert_eq!(srv.store.tried().len(), 5);
        assert!(srv.store.list_parcels().await.unwrap().is_empty());
        assert!(srv.store.list_messages().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn interrupted_fan_out_keeps_rows_already_written() {
    let store = FaultyStore::default();
    store.fail_message_at.store(3, Ordering::SeqCst);
    let (clerk, gaya) = seed(&store).await;
    let srv = TestServer::spawn(store).await;

    let res = book(&srv, &token_for(&clerk), &gaya).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "store_error");

    // The parcel and the first two rows stay; nothing is rolled back.
    let parcels = srv.store.list_parcels().await.unwrap();
    assert_eq!(parcels.len(), 1);
    let rows = srv.store.list_messages_by_parcel(parcels[0].id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(srv.store.message_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn interrupted_status_fan_out_reports_a_server_error() {
    let store = FaultyStore::default();
    let (clerk, gaya) = seed(&store).await;
    let srv = TestServer::spawn(store).await;
    let token = token_for(&clerk);

    let res = book(&srv, &token, &gaya).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let parcel: Value = res.json().await.unwrap();
    let parcel_id = parcel["id"].as_str().unwrap();

    // Booking wrote rows 1-4; the status update fails on its second row.
    srv.store.fail_message_at.store(6, Ordering::SeqCst);
    let res = reqwest::Client::new()
        .put(srv.url(&format!("/api/parcels/{parcel_id}/status")))
        .bearer_auth(&token)
        .json(&json!({ "status": "in_transit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let id: ParcelId = parcel_id.parse().unwrap();
    assert_eq!(srv.store.list_messages_by_parcel(id).await.unwrap().len(), 5);
    // The status change itself was saved before the fan-out.
    let stored = srv.store.get_parcel(id).await.unwrap().unwrap();
    assert_eq!(stored.status.to_string(), "in_transit");
}
