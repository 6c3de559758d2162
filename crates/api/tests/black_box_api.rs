use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use railparcel_api::app::{build_app_with, services::AppServices};
use railparcel_api::config::AppConfig;
use railparcel_auth::{JwtClaims, NewAdmin, NewUser, OtpChallenge, PrincipalId, PrincipalKind, Role, User};
use railparcel_core::StationId;
use railparcel_infra::{InMemoryStore, MemorySender, Store};
use railparcel_stations::{NewStation, Station};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    sender: Arc<MemorySender>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, on an ephemeral port, backed by the in-memory store.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            public_url: base_url.clone(),
            upload_dir: std::env::temp_dir().join(format!("railparcel-test-{}", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(MemorySender::new());
        let services = AppServices::new(store.clone(), sender.clone(), config);
        let app = build_app_with(Arc::new(services));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            sender,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn station(&self, code: &str, is_master: bool) -> Station {
        let station = NewStation {
            name: format!("{code} JN."),
            location: code.to_string(),
            code: code.to_string(),
            is_master,
        }
        .into_station(Utc::now())
        .unwrap();
        self.store.insert_station(&station).await.unwrap();
        station
    }

    async fn user(&self, email: &str, station: &Station, role: &str) -> User {
        let user = NewUser {
            name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            phone: None,
            station_id: station.id,
            role: Some(role.to_string()),
        }
        .into_user(Utc::now())
        .unwrap();
        self.store.insert_user(&user).await.unwrap();
        user
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: PrincipalId, kind: PrincipalKind, station_id: Option<StationId>, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        kind,
        station_id,
        roles,
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

fn user_token(user: &User) -> String {
    mint_jwt(user.id.into(), PrincipalKind::User, Some(user.station_id), vec![user.role.clone()])
}

/// Four stations with CNB as master, and one plain user at DHN and GAYA.
struct Network {
    cnb: Station,
    dhn: Station,
    gaya: Station,
    hwh: Station,
    dhn_user: User,
    gaya_user: User,
}

async fn network(srv: &TestServer) -> Network {
    let cnb = srv.station("CNB", true).await;
    let dhn = srv.station("DHN", false).await;
    let gaya = srv.station("GAYA", false).await;
    let hwh = srv.station("HWH", false).await;
    let dhn_user = srv.user("ravi@dhn.railway.in", &dhn, "user").await;
    let gaya_user = srv.user("sita@gaya.railway.in", &gaya, "user").await;
    Network {
        cnb,
        dhn,
        gaya,
        hwh,
        dhn_user,
        gaya_user,
    }
}

async fn book_parcel(client: &reqwest::Client, srv: &TestServer, token: &str, receiver: &Station) -> Value {
    let res = client
        .post(srv.url("/api/parcels"))
        .bearer_auth(token)
        .json(&json!({
            "receiver_station_id": receiver.id,
            "sender_name": "Ravi Kumar",
            "receiver_name": "Sita Devi",
            "weight": 4.5,
            "description": "Books",
            "initial_message": "Fragile, handle with care",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn messages_for_parcel(client: &reqwest::Client, srv: &TestServer, token: &str, parcel_id: &str) -> Vec<Value> {
    let res = client
        .get(srv.url("/api/messages/all"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let all: Vec<Value> = res.json().await.unwrap();
    all.into_iter().filter(|m| m["parcel_id"] == parcel_id).collect()
}

fn row_for<'a>(rows: &'a [&'a Value], station: &Station) -> &'a Value {
    rows.iter()
        .find(|m| m["to_station"] == json!(station.id))
        .copied()
        .unwrap_or_else(|| panic!("no row for {}", station.code))
}

#[tokio::test]
async fn health_and_station_list_are_public_but_the_rest_needs_a_token() {
    let srv = TestServer::spawn().await;
    network(&srv).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/api/stations")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stations: Vec<Value> = res.json().await.unwrap();
    assert_eq!(stations.len(), 4);

    let res = client.get(srv.url("/api/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = client
        .get(srv.url("/api/parcels"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otp_login_issues_a_token_accepted_in_either_header() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/auth/send-otp"))
        .json(&json!({ "email": "Ravi@DHN.railway.in", "station_code": "dhn" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["station"]["code"], "DHN");
    assert!(body["expires_at"].is_string());

    let code = srv.sender.last_code_for("ravi@dhn.railway.in").expect("code delivered");
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let res = client
        .post(srv.url("/api/auth/verify-otp"))
        .json(&json!({ "email": "ravi@dhn.railway.in", "otp": wrong }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "otp_invalid");

    let res = client
        .post(srv.url("/api/auth/verify-otp"))
        .json(&json!({ "email": "ravi@dhn.railway.in", "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["station"]["code"], "DHN");
    assert!(body["user"].get("otp").is_none());

    let res = client
        .get(srv.url("/api/auth/me"))
        .header("x-auth-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["id"], json!(net.dhn_user.id));

    // The code is consumed on success.
    let res = client
        .post(srv.url("/api/auth/verify-otp"))
        .json(&json!({ "email": "ravi@dhn.railway.in", "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "otp_not_requested");
}

#[tokio::test]
async fn send_otp_rejects_unknown_users_and_foreign_stations() {
    let srv = TestServer::spawn().await;
    network(&srv).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/auth/send-otp"))
        .json(&json!({ "email": "nobody@railway.in" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/api/auth/send-otp"))
        .json(&json!({ "email": "ravi@dhn.railway.in", "station_code": "GAYA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.sender.count(), 0);

    let res = client
        .post(srv.url("/api/auth/send-otp"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_codes_are_rejected() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();

    let mut user = net.gaya_user.clone();
    user.otp = Some(OtpChallenge {
        code: "123456".to_string(),
        expires_at: Utc::now() - ChronoDuration::minutes(1),
    });
    srv.store.update_user(&user).await.unwrap();

    let res = client
        .post(srv.url("/api/auth/verify-otp"))
        .json(&json!({ "email": "sita@gaya.railway.in", "otp": "123456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "otp_expired");
}

#[tokio::test]
async fn booking_a_parcel_notifies_every_station_once() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let token = user_token(&net.dhn_user);

    let parcel = book_parcel(&client, &srv, &token, &net.gaya).await;
    let tracking = parcel["tracking_number"].as_str().unwrap();
    assert!(tracking.starts_with("PMS-"));
    assert_eq!(tracking.len(), 12);
    assert_eq!(parcel["status"], "pending");
    assert_eq!(parcel["sender_station_id"], json!(net.dhn.id));
    assert_eq!(parcel["receiver_station"]["code"], "GAYA");

    let parcel_id = parcel["id"].as_str().unwrap();
    let rows = messages_for_parcel(&client, &srv, &token, parcel_id).await;
    assert_eq!(rows.len(), 4);
    let rows: Vec<&Value> = rows.iter().collect();

    let receiver = row_for(&rows, &net.gaya);
    assert_eq!(receiver["is_master_copied"], false);
    assert_eq!(receiver["content"], "Parcel sent from DHN JN.: Fragile, handle with care");

    let sender = row_for(&rows, &net.dhn);
    assert_eq!(sender["is_master_copied"], false);
    assert_eq!(sender["content"], "Parcel sent by Ravi Kumar from DHN JN.: Fragile, handle with care");

    let master = row_for(&rows, &net.cnb);
    assert_eq!(master["is_master_copied"], true);
    assert_eq!(master["content"], "Parcel sent from DHN JN.: Fragile, handle with care");

    let copy = row_for(&rows, &net.hwh);
    assert_eq!(copy["is_master_copied"], true);
    assert!(copy["content"].as_str().unwrap().starts_with("[COPY] "));

    assert!(rows.iter().all(|m| m["from_station"] == json!(net.dhn.id)));
}

#[tokio::test]
async fn status_updates_fan_out_and_reject_unknown_statuses() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let token = user_token(&net.dhn_user);

    let parcel = book_parcel(&client, &srv, &token, &net.gaya).await;
    let parcel_id = parcel["id"].as_str().unwrap();

    let gaya_token = user_token(&net.gaya_user);
    let res = client
        .put(srv.url(&format!("/api/parcels/{parcel_id}/status")))
        .bearer_auth(&gaya_token)
        .json(&json!({ "status": "in_transit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["status"], "in_transit");

    let rows = messages_for_parcel(&client, &srv, &token, parcel_id).await;
    let status_rows: Vec<&Value> = rows
        .iter()
        .filter(|m| m["content"].as_str().unwrap().ends_with("Parcel status updated to: in_transit"))
        .collect();
    assert_eq!(status_rows.len(), 4);
    assert!(status_rows.iter().all(|m| m["from_station"] == json!(net.gaya.id)));
    assert_eq!(status_rows.iter().filter(|m| m["is_master_copied"] == false).count(), 2);

    let res = client
        .put(srv.url(&format!("/api/parcels/{parcel_id}/status")))
        .bearer_auth(&gaya_token)
        .json(&json!({ "status": "teleported" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The parcel detail carries the thread, oldest first.
    let res = client
        .get(srv.url(&format!("/api/parcels/{parcel_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let detail: Value = res.json().await.unwrap();
    let thread = detail["messages"].as_array().unwrap();
    assert_eq!(thread.len(), 8);
    assert!(thread[0]["content"].as_str().unwrap().contains("Parcel sent"));
}

#[tokio::test]
async fn tracking_is_public_and_limited() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let token = user_token(&net.dhn_user);

    let first = book_parcel(&client, &srv, &token, &net.gaya).await;
    let second = book_parcel(&client, &srv, &token, &net.hwh).await;
    assert_ne!(first["tracking_number"], second["tracking_number"]);

    let tracking = first["tracking_number"].as_str().unwrap();
    let res = client
        .get(srv.url(&format!("/api/parcels/track/{tracking}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: Value = res.json().await.unwrap();
    assert_eq!(view["tracking_number"], tracking);
    assert_eq!(view["sender_station"]["code"], "DHN");
    assert_eq!(view["receiver_station"]["code"], "GAYA");
    assert!(view.get("id").is_none());
    assert!(view.get("sender_station_id").is_none());

    let res = client
        .get(srv.url("/api/parcels/track/PMS-00000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_recipient_may_mark_a_message_read() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let dhn_token = user_token(&net.dhn_user);
    let gaya_token = user_token(&net.gaya_user);

    let parcel = book_parcel(&client, &srv, &dhn_token, &net.gaya).await;

    let res = client
        .post(srv.url("/api/messages"))
        .bearer_auth(&dhn_token)
        .json(&json!({
            "to_station": net.gaya.id,
            "parcel_id": parcel["id"],
            "content": "Arriving on the 14:05",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let sent: Value = res.json().await.unwrap();
    assert_eq!(sent["to_station"], json!(net.gaya.id));
    assert_eq!(sent["is_master_copied"], false);
    assert_eq!(sent["parcel"]["tracking_number"], parcel["tracking_number"]);
    let message_id = sent["id"].as_str().unwrap();

    // Direct messages skip the origin: GAYA direct, CNB master, HWH copy.
    let rows = messages_for_parcel(&client, &srv, &dhn_token, parcel["id"].as_str().unwrap()).await;
    let direct_rows: Vec<&Value> = rows
        .iter()
        .filter(|m| m["content"].as_str().unwrap().ends_with("Arriving on the 14:05"))
        .collect();
    assert_eq!(direct_rows.len(), 3);
    assert!(direct_rows.iter().all(|m| m["to_station"] != json!(net.dhn.id)));

    let res = client
        .put(srv.url(&format!("/api/messages/{message_id}/read")))
        .bearer_auth(&dhn_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url(&format!("/api/messages/unread/{}", net.gaya.id)))
        .bearer_auth(&gaya_token)
        .send()
        .await
        .unwrap();
    let unread_before: Vec<Value> = res.json().await.unwrap();

    let res = client
        .put(srv.url(&format!("/api/messages/{message_id}/read")))
        .bearer_auth(&gaya_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["read"], true);

    let res = client
        .get(srv.url(&format!("/api/messages/unread/{}", net.gaya.id)))
        .bearer_auth(&gaya_token)
        .send()
        .await
        .unwrap();
    let unread_after: Vec<Value> = res.json().await.unwrap();
    assert_eq!(unread_after.len(), unread_before.len() - 1);

    // GAYA did not send it, and a plain user cannot delete others' messages.
    let res = client
        .delete(srv.url(&format!("/api/messages/{message_id}")))
        .bearer_auth(&gaya_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(srv.url(&format!("/api/messages/{message_id}")))
        .bearer_auth(&dhn_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn accounts_are_rechecked_on_every_request() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();

    let dhn_token = user_token(&net.dhn_user);
    srv.store.delete_user(net.dhn_user.id).await.unwrap();
    let res = client
        .get(srv.url("/api/auth/me"))
        .bearer_auth(&dhn_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let gaya_token = user_token(&net.gaya_user);
    srv.store.delete_station(net.gaya.id).await.unwrap();
    let res = client
        .get(srv.url("/api/auth/me"))
        .bearer_auth(&gaya_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no_station");
}

#[tokio::test]
async fn management_needs_the_master_role() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let master = srv.user("chief@cnb.railway.in", &net.cnb, "master").await;
    let master_token = user_token(&master);
    let plain_token = user_token(&net.dhn_user);

    let parcel = book_parcel(&client, &srv, &plain_token, &net.gaya).await;
    let parcel_id = parcel["id"].as_str().unwrap();

    for path in ["/api/parcels", "/api/messages", "/api/users"] {
        let res = client.get(srv.url(path)).bearer_auth(&plain_token).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
        let res = client.get(srv.url(path)).bearer_auth(&master_token).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
    }

    let res = client
        .delete(srv.url(&format!("/api/parcels/{parcel_id}")))
        .bearer_auth(&plain_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Stations with users or parcels cannot be removed.
    let res = client
        .delete(srv.url(&format!("/api/stations/{}", net.gaya.id)))
        .bearer_auth(&master_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(srv.url(&format!("/api/parcels/{parcel_id}")))
        .bearer_auth(&master_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(srv.store.list_messages_by_parcel(parcel["id"].as_str().unwrap().parse().unwrap()).await.unwrap().is_empty());

    // A second master station is refused.
    let res = client
        .post(srv.url("/api/stations"))
        .bearer_auth(&master_token)
        .json(&json!({ "name": "Patna Jn.", "location": "Patna", "code": "PNBE", "is_master": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(srv.url(&format!("/api/stations/{}", net.hwh.id)))
        .bearer_auth(&master_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn deleting_a_station_drops_its_message_rows() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let master = srv.user("chief@cnb.railway.in", &net.cnb, "master").await;
    let master_token = user_token(&master);
    let plain_token = user_token(&net.dhn_user);

    // HWH has no users and no parcels, but the booking still copied it.
    let parcel = book_parcel(&client, &srv, &plain_token, &net.gaya).await;
    let parcel_id = parcel["id"].as_str().unwrap();
    let rows = messages_for_parcel(&client, &srv, &plain_token, parcel_id).await;
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().any(|m| m["to_station"] == json!(net.hwh.id)));

    let res = client
        .delete(srv.url(&format!("/api/stations/{}", net.hwh.id)))
        .bearer_auth(&master_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let rows = messages_for_parcel(&client, &srv, &plain_token, parcel_id).await;
    assert_eq!(rows.len(), 3);
    assert!(rows
        .iter()
        .all(|m| m["to_station"] != json!(net.hwh.id) && m["from_station"] != json!(net.hwh.id)));
    assert!(srv.store.list_messages_by_station(net.hwh.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_routes_manage_accounts_without_granting_master() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();

    let admin = NewAdmin {
        username: "root".to_string(),
        email: "admin@railway.in".to_string(),
    }
    .into_admin(Utc::now())
    .unwrap();
    srv.store.insert_admin(&admin).await.unwrap();

    // Admin login goes through the same OTP channel.
    let res = client
        .post(srv.url("/api/admin/send-otp"))
        .json(&json!({ "email": "admin@railway.in" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let code = srv.sender.last_code_for("admin@railway.in").unwrap();
    let res = client
        .post(srv.url("/api/admin/verify-otp"))
        .json(&json!({ "email": "admin@railway.in", "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let admin_token = body["token"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url("/api/admin/me"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["username"], "root");

    let res = client
        .get(srv.url("/api/admin/users"))
        .bearer_auth(user_token(&net.dhn_user))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/api/admin/users"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": "Mohan",
            "email": "mohan@hwh.railway.in",
            "station_id": net.hwh.id,
            "role": "master",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["role"], "user");
    assert_eq!(created["station"]["code"], "HWH");

    let res = client
        .post(srv.url("/api/admin/users"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "name": "Mohan Again",
            "email": "mohan@hwh.railway.in",
            "station_id": net.hwh.id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(srv.url("/api/admin/stations"))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Patna Jn.", "location": "Patna", "code": "pnbe", "is_master": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let station: Value = res.json().await.unwrap();
    assert_eq!(station["code"], "PNBE");
    assert_eq!(station["is_master"], false);

    let res = client
        .post(srv.url("/api/admin/assign-user"))
        .bearer_auth(&admin_token)
        .json(&json!({ "userId": created["id"], "stationId": station["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["station"]["code"], "PNBE");

    // Administrators have no station to send from.
    let res = client
        .post(srv.url("/api/parcels"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "receiver_station_id": net.gaya.id,
            "sender_name": "A",
            "receiver_name": "B",
            "initial_message": "hi",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn parcel_images_are_stored_and_served() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let token = user_token(&net.dhn_user);

    let parcel = book_parcel(&client, &srv, &token, &net.gaya).await;
    let parcel_id = parcel["id"].as_str().unwrap();
    let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4];

    let form = reqwest::multipart::Form::new().part(
        "image",
        reqwest::multipart::Part::bytes(png.clone()).file_name("box.png"),
    );
    let res = client
        .post(srv.url(&format!("/api/parcels/{parcel_id}/image")))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let image_url = body["image_url"].as_str().unwrap().to_string();
    assert!(image_url.starts_with(&format!("{}/uploads/parcels/", srv.base_url)));

    let res = client.get(&image_url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().to_vec(), png);

    let form = reqwest::multipart::Form::new().part(
        "image",
        reqwest::multipart::Part::bytes(b"MZ".to_vec()).file_name("tool.exe"),
    );
    let res = client
        .post(srv.url(&format!("/api/parcels/{parcel_id}/image")))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn booking_form_may_carry_a_photo() {
    let srv = TestServer::spawn().await;
    let net = network(&srv).await;
    let client = reqwest::Client::new();
    let token = user_token(&net.dhn_user);
    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 9, 9];

    let form = |file_name: &str, bytes: Vec<u8>| {
        reqwest::multipart::Form::new()
            .text("receiver_station_id", net.gaya.id.to_string())
            .text("sender_name", "Ravi Kumar")
            .text("receiver_name", "Sita Devi")
            .text("weight", "2.5")
            .text("description", "")
            .text("initial_message", "Photo attached")
            .part("image", reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()))
    };

    let res = client
        .post(srv.url("/api/parcels"))
        .bearer_auth(&token)
        .multipart(form("crate.jpg", jpeg.clone()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let parcel: Value = res.json().await.unwrap();
    assert_eq!(parcel["weight"], json!(2.5));
    assert_eq!(parcel["description"], Value::Null);
    let image_url = parcel["image_url"].as_str().unwrap().to_string();
    assert!(image_url.starts_with(&format!("{}/uploads/parcels/", srv.base_url)));

    let res = client.get(&image_url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().to_vec(), jpeg);

    // The booking still fans out like a JSON one.
    let rows = messages_for_parcel(&client, &srv, &token, parcel["id"].as_str().unwrap()).await;
    assert_eq!(rows.len(), 4);

    // A bad photo is refused before anything is written.
    let res = client
        .post(srv.url("/api/parcels"))
        .bearer_auth(&token)
        .multipart(form("tool.exe", b"MZ".to_vec()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.store.list_parcels().await.unwrap().len(), 1);
}
