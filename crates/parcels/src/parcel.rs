use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use railparcel_core::{DomainError, DomainResult, Entity, ParcelId, StationId, require_non_empty};
use railparcel_stations::StationSummary;

/// Parcel status lifecycle.
///
/// Any status may follow any other; stations correct mistakes by re-posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    #[default]
    Pending,
    InTransit,
    Delivered,
    Returned,
    Lost,
}

impl ParcelStatus {
    pub const ALL: [ParcelStatus; 5] = [
        ParcelStatus::Pending,
        ParcelStatus::InTransit,
        ParcelStatus::Delivered,
        ParcelStatus::Returned,
        ParcelStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Pending => "pending",
            ParcelStatus::InTransit => "in_transit",
            ParcelStatus::Delivered => "delivered",
            ParcelStatus::Returned => "returned",
            ParcelStatus::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim())
            .ok_or_else(|| {
                DomainError::validation(
                    "status must be one of: pending, in_transit, delivered, returned, lost",
                )
            })
    }
}

impl core::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parcel travelling from a sender station to a receiver station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: ParcelId,
    pub tracking_number: String,
    pub sender_station_id: StationId,
    pub receiver_station_id: StationId,
    pub status: ParcelStatus,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub sender_name: String,
    pub receiver_name: String,
    pub sender_contact: Option<String>,
    pub receiver_contact: Option<String>,
    /// Relative path under the upload root, or an absolute URL.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Parcel {
    type Id = ParcelId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for booking a parcel. The sender station comes from the caller's
/// account, never from the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewParcel {
    pub receiver_station_id: Option<StationId>,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub sender_name: String,
    pub receiver_name: String,
    pub sender_contact: Option<String>,
    pub receiver_contact: Option<String>,
    /// First message broadcast to every station.
    pub initial_message: String,
}

fn optional_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl NewParcel {
    /// Validate and build the parcel record.
    pub fn into_parcel(
        self,
        sender_station_id: StationId,
        tracking_number: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Parcel> {
        let receiver_station_id = self
            .receiver_station_id
            .ok_or_else(|| DomainError::validation("receiver_station_id is required"))?;
        require_non_empty("initial_message", &self.initial_message)?;
        if let Some(w) = self.weight {
            if !w.is_finite() || w < 0.0 {
                return Err(DomainError::validation("weight must be a non-negative number"));
            }
        }

        Ok(Parcel {
            id: ParcelId::new(),
            tracking_number,
            sender_station_id,
            receiver_station_id,
            status: ParcelStatus::Pending,
            weight: self.weight,
            description: optional_text(self.description),
            sender_name: require_non_empty("sender_name", &self.sender_name)?,
            receiver_name: require_non_empty("receiver_name", &self.receiver_name)?,
            sender_contact: optional_text(self.sender_contact),
            receiver_contact: optional_text(self.receiver_contact),
            image_url: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Parcel {
    pub fn set_status(&mut self, status: ParcelStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    pub fn set_image(&mut self, image_url: String, now: DateTime<Utc>) -> Option<String> {
        self.updated_at = now;
        self.image_url.replace(image_url)
    }

    /// Whether `station` is one end of this parcel's route.
    pub fn involves(&self, station: StationId) -> bool {
        self.sender_station_id == station || self.receiver_station_id == station
    }
}

/// Public tracking view. Deliberately omits internal ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelTracking {
    pub tracking_number: String,
    pub status: ParcelStatus,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub sender_name: String,
    pub receiver_name: String,
    pub sender_contact: Option<String>,
    pub receiver_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sender_station: Option<StationSummary>,
    pub receiver_station: Option<StationSummary>,
    pub image_url: Option<String>,
}

impl ParcelTracking {
    pub fn new(
        parcel: &Parcel,
        sender_station: Option<StationSummary>,
        receiver_station: Option<StationSummary>,
        image_url: Option<String>,
    ) -> Self {
        Self {
            tracking_number: parcel.tracking_number.clone(),
            status: parcel.status,
            weight: parcel.weight,
            description: parcel.description.clone(),
            sender_name: parcel.sender_name.clone(),
            receiver_name: parcel.receiver_name.clone(),
            sender_contact: parcel.sender_contact.clone(),
            receiver_contact: parcel.receiver_contact.clone(),
            created_at: parcel.created_at,
            updated_at: parcel.updated_at,
            sender_station,
            receiver_station,
            image_url,
        }
    }
}
