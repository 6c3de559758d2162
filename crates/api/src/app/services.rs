use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use railparcel_auth::{
    Admin, Hs256Jwt, NewUser, OtpChallenge, Permission, PrincipalKind, Role, User, UserPatch,
    user::{normalize_email, normalize_phone},
};
use railparcel_core::{DomainError, MessageId, ParcelId, StationId, UserId};
use railparcel_infra::{
    FallbackSender, ImageStore, InMemoryStore, OtpSender, PostgresStore, PostmarkSender, RapidApiSender, SharedSender,
    SharedStore, SmtpSender, SmtpSettings, StoreError,
    seed::{bootstrap_admin, seed_demo_stations},
    uploads::{absolute_url, check_image},
};
use railparcel_messaging::{FanoutEvent, Message, NewMessage, plan_fanout};
use railparcel_parcels::{NewParcel, Parcel, ParcelStatus, ParcelTracking, generate_tracking_number, is_tracking_number};
use railparcel_stations::{NewStation, Station, StationPatch, StationSummary, ensure_single_master, station::normalize_code};

use crate::app::dto::{
    AdminSendOtpRequest, AdminVerifyOtpRequest, MessageView, ParcelRef, ParcelView, SendOtpRequest, StationDetail,
    StationDirectory, UserView, VerifyOtpRequest,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::config::AppConfig;
use crate::context::PrincipalContext;

/// Fresh tracking numbers tried before giving up on a parcel booking.
const TRACKING_ATTEMPTS: usize = 5;

/// Shared application state handed to every handler.
pub struct AppServices {
    pub store: SharedStore,
    pub jwt: Arc<Hs256Jwt>,
    pub sender: SharedSender,
    pub images: ImageStore,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct OtpSent {
    pub message: &'static str,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<StationSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserLogin {
    pub message: &'static str,
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct AdminLogin {
    pub message: &'static str,
    pub token: String,
    pub admin: Admin,
}

/// Wire the store, OTP channels and seed data from configuration.
pub async fn build_services(config: AppConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("using postgres store");
            Arc::new(PostgresStore::connect(url).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let sender: SharedSender = Arc::new(FallbackSender::new(email_chain(&config)));

    let now = Utc::now();
    if let Some(email) = config.admin_email.as_deref() {
        bootstrap_admin(store.as_ref(), email, &config.admin_username, now).await?;
    }
    if config.seed_demo_data {
        seed_demo_stations(store.as_ref(), now).await?;
    }

    Ok(AppServices::new(store, sender, config))
}

/// Configured email providers in delivery order: SMTP, Postmark, RapidAPI.
pub fn email_chain(config: &AppConfig) -> Vec<SharedSender> {
    let mut chain: Vec<SharedSender> = Vec::new();

    if let (Some(host), Some(username)) = (config.smtp_host.clone(), config.smtp_username.clone()) {
        let settings = SmtpSettings {
            host,
            port: config.smtp_port,
            from_email: config.smtp_from_email.clone().unwrap_or_else(|| username.clone()),
            username,
            password: config.smtp_password.clone().unwrap_or_default(),
        };
        match SmtpSender::new(settings, config.otp_ttl_minutes) {
            Ok(sender) => chain.push(Arc::new(sender)),
            Err(e) => tracing::warn!(error = %e, "smtp disabled"),
        }
    }
    if let Some(token) = config.postmark_server_token.clone() {
        match PostmarkSender::new(token, config.postmark_from_email.clone(), config.otp_ttl_minutes) {
            Ok(sender) => chain.push(Arc::new(sender)),
            Err(e) => tracing::warn!(error = %e, "postmark disabled"),
        }
    }
    if let Some(key) = config.rapidapi_key.clone() {
        match RapidApiSender::new(key) {
            Ok(sender) => chain.push(Arc::new(sender)),
            Err(e) => tracing::warn!(error = %e, "rapidapi disabled"),
        }
    }

    tracing::info!(
        providers = ?chain.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "OTP email chain ready"
    );
    chain
}

fn not_found(what: &'static str) -> ApiError {
    DomainError::not_found(what).into()
}

impl AppServices {
    pub fn new(store: SharedStore, sender: SharedSender, config: AppConfig) -> Self {
        let jwt = Hs256Jwt::new(config.jwt_secret.as_bytes(), Duration::hours(config.token_ttl_hours));
        Self {
            store,
            jwt: Arc::new(jwt),
            sender,
            images: ImageStore::new(config.upload_dir.clone()),
            config: Arc::new(config),
        }
    }

    fn otp_ttl(&self) -> Duration {
        Duration::minutes(self.config.otp_ttl_minutes)
    }

    fn public_image(&self, mut parcel: Parcel) -> Parcel {
        parcel.image_url = parcel.image_url.map(|u| absolute_url(&self.config.public_url, &u));
        parcel
    }

    async fn directory(&self) -> ApiResult<StationDirectory> {
        Ok(StationDirectory::new(&self.store.list_stations().await?))
    }

    async fn station(&self, id: StationId) -> ApiResult<Station> {
        self.store.get_station(id).await?.ok_or_else(|| not_found("station"))
    }

    async fn user(&self, id: UserId) -> ApiResult<User> {
        self.store.get_user(id).await?.ok_or_else(|| not_found("user"))
    }

    async fn parcel(&self, id: ParcelId) -> ApiResult<Parcel> {
        self.store.get_parcel(id).await?.ok_or_else(|| not_found("parcel"))
    }

    async fn message(&self, id: MessageId) -> ApiResult<Message> {
        self.store.get_message(id).await?.ok_or_else(|| not_found("message"))
    }

    /// OTP delivery never fails the request.
    async fn deliver_otp(&self, recipient: &str, challenge: &OtpChallenge) {
        if let Err(e) = self.sender.send(recipient, &challenge.code).await {
            tracing::warn!(channel = self.sender.name(), error = %e, "OTP delivery failed");
        }
    }

    // -------------------------
    // Station user login
    // -------------------------

    async fn find_login_user(&self, email: Option<&str>, phone: Option<&str>) -> ApiResult<(User, String)> {
        let (found, recipient) = match (email.map(str::trim).filter(|e| !e.is_empty()), normalize_phone(phone)) {
            (Some(email), _) => {
                let email = normalize_email(email)?;
                (self.store.find_user_by_email(&email).await?, email)
            }
            (None, Some(phone)) => (self.store.find_user_by_phone(&phone).await?, phone),
            (None, None) => return Err(ApiError::bad_request("email or phone is required")),
        };
        let user = found.ok_or_else(|| not_found("user"))?;
        Ok((user, recipient))
    }

    pub async fn send_user_otp(&self, req: SendOtpRequest) -> ApiResult<OtpSent> {
        let (mut user, recipient) = self.find_login_user(req.email.as_deref(), req.phone.as_deref()).await?;

        let station = self
            .store
            .get_station(user.station_id)
            .await?
            .ok_or_else(|| DomainError::validation("account is not associated with any station"))?;

        if let Some(code) = req.station_code.as_deref().filter(|c| !c.trim().is_empty()) {
            if normalize_code(code)? != station.code {
                return Err(DomainError::forbidden("you are not authorized to access this station").into());
            }
        }

        let challenge = user.issue_otp(Utc::now(), self.otp_ttl()).clone();
        self.store.update_user(&user).await?;
        self.deliver_otp(&recipient, &challenge).await;
        tracing::info!(user_id = %user.id, station = %station.code, "login code issued");

        Ok(OtpSent {
            message: "OTP sent successfully",
            expires_at: challenge.expires_at,
            station: Some(StationSummary::from(&station)),
        })
    }

    pub async fn verify_user_otp(&self, req: VerifyOtpRequest) -> ApiResult<UserLogin> {
        let code = req
            .otp
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::bad_request("otp is required"))?
            .to_string();
        let (mut user, _) = self.find_login_user(req.email.as_deref(), req.phone.as_deref()).await?;

        let station = self
            .store
            .get_station(user.station_id)
            .await?
            .ok_or_else(|| DomainError::validation("account is not associated with any station"))?;

        let now = Utc::now();
        user.verify_otp(&code, now)?;
        self.store.update_user(&user).await?;

        let claims = self.jwt.claims_for(
            user.id.into(),
            PrincipalKind::User,
            Some(user.station_id),
            vec![user.role.clone()],
            now,
        );
        let token = self.jwt.encode(&claims)?;
        tracing::info!(user_id = %user.id, "user logged in");

        Ok(UserLogin {
            message: "Login successful",
            token,
            user: UserView {
                user,
                station: Some(station),
            },
        })
    }

    pub async fn current_user(&self, id: UserId) -> ApiResult<UserView> {
        let user = self.user(id).await?;
        let station = self.store.get_station(user.station_id).await?;
        Ok(UserView { user, station })
    }

    // -------------------------
    // Administrator login
    // -------------------------

    async fn find_admin(&self, email: Option<&str>) -> ApiResult<Admin> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ApiError::bad_request("email is required"))?;
        let email = normalize_email(email)?;
        self.store.find_admin_by_email(&email).await?.ok_or_else(|| not_found("admin"))
    }

    pub async fn send_admin_otp(&self, req: AdminSendOtpRequest) -> ApiResult<OtpSent> {
        let mut admin = self.find_admin(req.email.as_deref()).await?;
        let challenge = admin.issue_otp(Utc::now(), self.otp_ttl()).clone();
        self.store.update_admin(&admin).await?;
        self.deliver_otp(&admin.email, &challenge).await;
        tracing::info!(admin_id = %admin.id, "admin login code issued");

        Ok(OtpSent {
            message: "OTP sent successfully",
            expires_at: challenge.expires_at,
            station: None,
        })
    }

    pub async fn verify_admin_otp(&self, req: AdminVerifyOtpRequest) -> ApiResult<AdminLogin> {
        let code = req
            .otp
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::bad_request("otp is required"))?
            .to_string();
        let mut admin = self.find_admin(req.email.as_deref()).await?;

        let now = Utc::now();
        admin.verify_otp(&code, now)?;
        self.store.update_admin(&admin).await?;

        let claims = self
            .jwt
            .claims_for(admin.id.into(), PrincipalKind::Admin, None, vec![Role::ADMIN], now);
        let token = self.jwt.encode(&claims)?;
        tracing::info!(admin_id = %admin.id, "admin logged in");

        Ok(AdminLogin {
            message: "Admin login successful",
            token,
            admin,
        })
    }

    pub async fn current_admin(&self, ctx: &PrincipalContext) -> ApiResult<Admin> {
        let id = ctx.admin_id().ok_or_else(|| DomainError::forbidden("admin token required"))?;
        self.store.get_admin(id).await?.ok_or_else(|| not_found("admin"))
    }

    // -------------------------
    // Stations
    // -------------------------

    pub async fn list_stations(&self) -> ApiResult<Vec<Station>> {
        Ok(self.store.list_stations().await?)
    }

    pub async fn station_detail(&self, id: StationId) -> ApiResult<StationDetail> {
        let station = self.station(id).await?;
        let users = self.store.list_users_by_station(id).await?;
        Ok(StationDetail { station, users })
    }

    /// `allow_master` is false on administrator routes, which never touch the flag.
    pub async fn create_station(&self, mut input: NewStation, allow_master: bool) -> ApiResult<Station> {
        if !allow_master {
            input.is_master = false;
        }
        let station = input.into_station(Utc::now())?;
        ensure_single_master(&station, &self.store.list_stations().await?)?;
        self.store.insert_station(&station).await?;
        tracing::info!(station_id = %station.id, code = %station.code, "station created");
        Ok(station)
    }

    pub async fn update_station(&self, id: StationId, mut patch: StationPatch, allow_master: bool) -> ApiResult<Station> {
        if !allow_master {
            patch.is_master = None;
        }
        let mut station = self.station(id).await?;
        station.apply(patch, Utc::now())?;
        ensure_single_master(&station, &self.store.list_stations().await?)?;
        self.store.update_station(&station).await?;
        Ok(station)
    }

    /// Refused while users or parcels still reference the station. Message
    /// rows sent from or addressed to it go with it.
    pub async fn delete_station(&self, id: StationId) -> ApiResult<()> {
        self.station(id).await?;
        if !self.store.list_users_by_station(id).await?.is_empty() {
            return Err(DomainError::validation("cannot delete station with associated users").into());
        }
        if !self.store.list_parcels_by_station(id).await?.is_empty() {
            return Err(DomainError::validation("cannot delete station with associated parcels").into());
        }
        let removed = self.store.delete_messages_by_station(id).await?;
        self.store.delete_station(id).await?;
        tracing::info!(station_id = %id, messages = removed, "station deleted");
        Ok(())
    }

    // -------------------------
    // Users
    // -------------------------

    async fn require_station_exists(&self, id: StationId) -> ApiResult<()> {
        match self.store.get_station(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::validation("station not found").into()),
        }
    }

    pub async fn list_users(&self) -> ApiResult<Vec<UserView>> {
        let stations: HashMap<StationId, Station> =
            self.store.list_stations().await?.into_iter().map(|s| (s.id, s)).collect();
        Ok(self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|user| UserView {
                station: stations.get(&user.station_id).cloned(),
                user,
            })
            .collect())
    }

    pub async fn get_user(&self, id: UserId) -> ApiResult<UserView> {
        self.current_user(id).await
    }

    /// `allow_role` is false on administrator routes: accounts created there are plain users.
    pub async fn create_user(&self, mut input: NewUser, allow_role: bool) -> ApiResult<UserView> {
        if !allow_role {
            input.role = None;
        }
        self.require_station_exists(input.station_id).await?;
        let user = input.into_user(Utc::now())?;
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, station_id = %user.station_id, "user created");
        self.current_user(user.id).await
    }

    pub async fn update_user(&self, id: UserId, mut patch: UserPatch, allow_role: bool) -> ApiResult<UserView> {
        if !allow_role {
            patch.role = None;
        }
        if let Some(station_id) = patch.station_id {
            self.require_station_exists(station_id).await?;
        }
        let mut user = self.user(id).await?;
        user.apply(patch, Utc::now())?;
        self.store.update_user(&user).await?;
        self.current_user(id).await
    }

    pub async fn delete_user(&self, id: UserId) -> ApiResult<()> {
        self.store.delete_user(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => not_found("user"),
            other => other.into(),
        })?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    pub async fn assign_user(&self, user_id: UserId, station_id: StationId) -> ApiResult<UserView> {
        let mut user = self.user(user_id).await?;
        let station = self.station(station_id).await?;
        user.apply(
            UserPatch {
                station_id: Some(station.id),
                ..Default::default()
            },
            Utc::now(),
        )?;
        self.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, station_id = %station.id, "user assigned");
        Ok(UserView {
            user,
            station: Some(station),
        })
    }

    // -------------------------
    // Parcels
    // -------------------------

    async fn parcel_views(&self, parcels: Vec<Parcel>) -> ApiResult<Vec<ParcelView>> {
        let dir = self.directory().await?;
        Ok(parcels
            .into_iter()
            .map(|p| dir.parcel_view(self.public_image(p), None))
            .collect())
    }

    pub async fn list_parcels(&self) -> ApiResult<Vec<ParcelView>> {
        let parcels = self.store.list_parcels().await?;
        self.parcel_views(parcels).await
    }

    pub async fn list_station_parcels(&self, station_id: StationId) -> ApiResult<Vec<ParcelView>> {
        self.station(station_id).await?;
        let parcels = self.store.list_parcels_by_station(station_id).await?;
        self.parcel_views(parcels).await
    }

    pub async fn parcel_detail(&self, id: ParcelId) -> ApiResult<ParcelView> {
        let parcel = self.parcel(id).await?;
        let dir = self.directory().await?;
        // Thread oldest first.
        let messages = self
            .store
            .list_messages_by_parcel(id)
            .await?
            .into_iter()
            .map(|m| dir.message_view(m, None))
            .collect();
        Ok(dir.parcel_view(self.public_image(parcel), Some(messages)))
    }

    /// Book a parcel from `sender_station` and notify the network.
    pub async fn create_parcel(&self, sender_station: StationId, input: NewParcel) -> ApiResult<ParcelView> {
        let sender = self
            .store
            .get_station(sender_station)
            .await?
            .ok_or_else(|| DomainError::validation("sender station not found"))?;
        if let Some(receiver) = input.receiver_station_id {
            if self.store.get_station(receiver).await?.is_none() {
                return Err(DomainError::validation("receiver station not found").into());
            }
        }

        let mut attempt = 0;
        let parcel = loop {
            attempt += 1;
            let parcel = input.clone().into_parcel(sender.id, generate_tracking_number(), Utc::now())?;
            match self.store.insert_parcel(&parcel).await {
                Ok(()) => break parcel,
                Err(StoreError::Conflict(reason)) if attempt < TRACKING_ATTEMPTS => {
                    tracing::warn!(attempt, %reason, "tracking number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };
        tracing::info!(parcel_id = %parcel.id, tracking = %parcel.tracking_number, "parcel created");

        self.fan_out(FanoutEvent::parcel_created(&parcel, &sender.name, &input.initial_message))
            .await?;

        let dir = self.directory().await?;
        Ok(dir.parcel_view(self.public_image(parcel), None))
    }

    /// Book a parcel that may carry a photo. The photo is checked before
    /// anything is written, then stored once the parcel exists.
    pub async fn create_parcel_with_image(
        &self,
        sender_station: StationId,
        input: NewParcel,
        image: Option<(String, Vec<u8>)>,
    ) -> ApiResult<ParcelView> {
        if let Some((file_name, bytes)) = &image {
            check_image(file_name, bytes)?;
        }
        let view = self.create_parcel(sender_station, input).await?;
        let Some((file_name, bytes)) = image else {
            return Ok(view);
        };

        let id = view.parcel.id;
        self.attach_image(id, &file_name, &bytes).await?;
        let dir = self.directory().await?;
        Ok(dir.parcel_view(self.public_image(self.parcel(id).await?), None))
    }

    /// Store an image for the parcel, replacing any previous one. Returns the absolute URL.
    pub async fn attach_image(&self, id: ParcelId, file_name: &str, bytes: &[u8]) -> ApiResult<String> {
        let mut parcel = self.parcel(id).await?;
        let url = self.images.save(&parcel.tracking_number, file_name, bytes).await?;
        let previous = parcel.set_image(url.clone(), Utc::now());
        self.store.update_parcel(&parcel).await?;
        if let Some(old) = previous.filter(|old| *old != url) {
            self.images.delete(&old).await;
        }
        Ok(absolute_url(&self.config.public_url, &url))
    }

    pub async fn update_status(&self, id: ParcelId, status: &str, actor_station: StationId) -> ApiResult<ParcelView> {
        let status = ParcelStatus::parse(status)?;
        let mut parcel = self.parcel(id).await?;
        parcel.set_status(status, Utc::now());
        self.store.update_parcel(&parcel).await?;
        tracing::info!(parcel_id = %parcel.id, %status, "parcel status updated");

        self.fan_out(FanoutEvent::status_changed(&parcel, status, actor_station))
            .await?;

        let dir = self.directory().await?;
        Ok(dir.parcel_view(self.public_image(parcel), None))
    }

    /// Removes the parcel, its message thread and its image.
    pub async fn delete_parcel(&self, id: ParcelId) -> ApiResult<()> {
        let parcel = self.parcel(id).await?;
        let removed = self.store.delete_messages_by_parcel(id).await?;
        self.store.delete_parcel(id).await?;
        if let Some(url) = parcel.image_url.as_deref() {
            self.images.delete(url).await;
        }
        tracing::info!(parcel_id = %id, messages = removed, "parcel deleted");
        Ok(())
    }

    pub async fn track(&self, tracking_number: &str) -> ApiResult<ParcelTracking> {
        let tracking_number = tracking_number.trim().to_uppercase();
        if !is_tracking_number(&tracking_number) {
            return Err(not_found("parcel"));
        }
        let parcel = self
            .store
            .find_parcel_by_tracking(&tracking_number)
            .await?
            .ok_or_else(|| not_found("parcel"))?;
        let dir = self.directory().await?;
        let image_url = parcel
            .image_url
            .as_deref()
            .map(|u| absolute_url(&self.config.public_url, u));
        Ok(ParcelTracking::new(
            &parcel,
            dir.summary(parcel.sender_station_id),
            dir.summary(parcel.receiver_station_id),
            image_url,
        ))
    }

    // -------------------------
    // Messages
    // -------------------------

    async fn message_views(&self, messages: Vec<Message>) -> ApiResult<Vec<MessageView>> {
        let dir = self.directory().await?;
        let mut parcels: HashMap<ParcelId, Option<ParcelRef>> = HashMap::new();
        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            if !parcels.contains_key(&message.parcel_id) {
                let found = self.store.get_parcel(message.parcel_id).await?;
                parcels.insert(message.parcel_id, found.as_ref().map(ParcelRef::from));
            }
            let parcel = parcels.get(&message.parcel_id).cloned().flatten();
            views.push(dir.message_view(message, parcel));
        }
        Ok(views)
    }

    pub async fn list_messages(&self) -> ApiResult<Vec<MessageView>> {
        let messages = self.store.list_messages().await?;
        self.message_views(messages).await
    }

    pub async fn station_messages(&self, station_id: StationId) -> ApiResult<Vec<MessageView>> {
        self.station(station_id).await?;
        let messages = self.store.list_messages_by_station(station_id).await?;
        self.message_views(messages).await
    }

    pub async fn unread_messages(&self, station_id: StationId) -> ApiResult<Vec<MessageView>> {
        let messages = self.store.list_unread_messages(station_id).await?;
        self.message_views(messages).await
    }

    /// Send a direct message; the network still receives copies. Returns the addressed row.
    pub async fn send_message(&self, from: StationId, input: NewMessage) -> ApiResult<MessageView> {
        let content = input.validated_content()?;
        if self.store.get_station(input.to_station).await?.is_none() {
            return Err(DomainError::validation("recipient station not found").into());
        }
        if self.store.get_parcel(input.parcel_id).await?.is_none() {
            return Err(DomainError::validation("parcel not found").into());
        }

        let written = self
            .fan_out(FanoutEvent::direct_message(from, input.to_station, input.parcel_id, content))
            .await?;
        let direct = written
            .into_iter()
            .find(|m| m.to_station == input.to_station && !m.is_master_copied)
            .ok_or_else(|| not_found("message"))?;

        let mut views = self.message_views(vec![direct]).await?;
        views.pop().ok_or_else(|| not_found("message"))
    }

    pub async fn mark_read(&self, id: MessageId, reader: StationId) -> ApiResult<Message> {
        let mut message = self.message(id).await?;
        message.mark_read(reader, Utc::now())?;
        self.store.update_message(&message).await?;
        Ok(message)
    }

    /// Only the origin station, or a holder of `messages.delete_any`, may delete.
    pub async fn delete_message(&self, id: MessageId, ctx: &PrincipalContext) -> ApiResult<()> {
        let message = self.message(id).await?;
        let own = ctx.station().ok() == Some(message.from_station);
        if !own && !ctx.can(&Permission::MESSAGES_DELETE_ANY) {
            return Err(DomainError::forbidden("you can only delete messages sent from your station").into());
        }
        self.store.delete_message(id).await?;
        Ok(())
    }

    /// Plan and persist one logical message across the network.
    async fn fan_out(&self, event: FanoutEvent) -> ApiResult<Vec<Message>> {
        let stations = self.store.list_stations().await?;
        let now = Utc::now();
        let messages: Vec<Message> = plan_fanout(&event, &stations)
            .into_iter()
            .map(|d| d.into_message(&event, now))
            .collect();
        let written = self.store.insert_messages(&messages).await?;
        tracing::debug!(origin = %event.origin, parcel_id = %event.parcel_id, rows = written, "fan-out written");
        Ok(messages)
    }
}
