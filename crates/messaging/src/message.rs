use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use railparcel_core::{DomainError, DomainResult, Entity, MessageId, ParcelId, StationId};

/// One stored message row addressed to a single station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from_station: StationId,
    pub to_station: StationId,
    pub parcel_id: ParcelId,
    pub content: String,
    pub read: bool,
    /// Set on every row that is not addressed to a direct party.
    pub is_master_copied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Message {
    type Id = MessageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Request body for a station-to-station message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub to_station: StationId,
    pub parcel_id: ParcelId,
    pub content: String,
}

impl NewMessage {
    pub fn validated_content(&self) -> DomainResult<String> {
        railparcel_core::require_non_empty("content", &self.content)
    }
}

impl Message {
    /// Only the addressed station may acknowledge a message.
    pub fn mark_read(&mut self, reader: StationId, now: DateTime<Utc>) -> DomainResult<()> {
        if self.to_station != reader {
            return Err(DomainError::forbidden(
                "you can only mark messages sent to your station as read",
            ));
        }
        self.read = true;
        self.updated_at = now;
        Ok(())
    }

    pub fn involves(&self, station: StationId) -> bool {
        self.from_station == station || self.to_station == station
    }
}
