use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use railparcel_auth::User;
use railparcel_core::{ParcelId, StationId};
use railparcel_messaging::Message;
use railparcel_parcels::{Parcel, ParcelStatus};
use railparcel_stations::{Station, StationSummary};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Station the caller is logging in to; must match the account's station.
    pub station_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSendOtpRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminVerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignUserRequest {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    #[serde(alias = "stationId")]
    pub station_id: Option<String>,
}

// -------------------------
// Response views
// -------------------------

#[derive(Debug, Serialize)]
pub struct StationDetail {
    #[serde(flatten)]
    pub station: Station,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub station: Option<Station>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParcelRef {
    pub id: ParcelId,
    pub tracking_number: String,
    pub status: ParcelStatus,
}

impl From<&Parcel> for ParcelRef {
    fn from(p: &Parcel) -> Self {
        Self {
            id: p.id,
            tracking_number: p.tracking_number.clone(),
            status: p.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<StationSummary>,
    pub receiver: Option<StationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parcel: Option<ParcelRef>,
}

#[derive(Debug, Serialize)]
pub struct ParcelView {
    #[serde(flatten)]
    pub parcel: Parcel,
    pub sender_station: Option<StationSummary>,
    pub receiver_station: Option<StationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageView>>,
}

/// Station summaries keyed by id, loaded once per request.
#[derive(Debug, Default)]
pub struct StationDirectory {
    by_id: HashMap<StationId, StationSummary>,
}

impl StationDirectory {
    pub fn new(stations: &[Station]) -> Self {
        Self {
            by_id: stations.iter().map(|s| (s.id, StationSummary::from(s))).collect(),
        }
    }

    pub fn summary(&self, id: StationId) -> Option<StationSummary> {
        self.by_id.get(&id).cloned()
    }

    pub fn message_view(&self, message: Message, parcel: Option<ParcelRef>) -> MessageView {
        MessageView {
            sender: self.summary(message.from_station),
            receiver: self.summary(message.to_station),
            parcel,
            message,
        }
    }

    pub fn parcel_view(&self, parcel: Parcel, messages: Option<Vec<MessageView>>) -> ParcelView {
        ParcelView {
            sender_station: self.summary(parcel.sender_station_id),
            receiver_station: self.summary(parcel.receiver_station_id),
            messages,
            parcel,
        }
    }
}
