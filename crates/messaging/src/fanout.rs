//! Message fan-out for parcel events.
//!
//! Every parcel event (booking, status change) and every station-to-station
//! message is broadcast as separate rows, one per recipient station:
//!
//! | recipient                        | content             | `is_master_copied` | kind     |
//! |----------------------------------|---------------------|--------------------|----------|
//! | direct parties (sender/receiver, or the addressee) | unchanged | `false` | `Direct` |
//! | master station, if not already a recipient | unchanged  | `true`             | `Master` |
//! | every other station              | `"[COPY] " + content` | `true`           | `Copy`   |
//!
//! No station receives two rows for one event. For parcel events every
//! station gets exactly one row, including the station that triggered it;
//! for direct messages the originating station gets none.
//!
//! Planning is pure: it returns the rows to insert and never touches storage.
//! The caller writes them one by one, without a transaction.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use railparcel_core::{MessageId, ParcelId, StationId};
use railparcel_parcels::{Parcel, ParcelStatus};
use railparcel_stations::Station;

use crate::Message;

/// Prefix marking a broadcast copy.
pub const COPY_PREFIX: &str = "[COPY] ";

/// Who the broadcast must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutScope {
    /// Parcel lifecycle event: one row for every station.
    ParcelEvent,
    /// Station-to-station message: every station except the origin.
    Direct,
}

/// Why a station received a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Direct,
    Master,
    Copy,
}

/// One logical message before fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutEvent {
    /// Station the message is attributed to (`from_station` of every row).
    pub origin: StationId,
    pub parcel_id: ParcelId,
    /// Direct recipients, in delivery order. Duplicates are ignored.
    pub direct: Vec<StationId>,
    pub scope: FanoutScope,
    pub content: String,
    /// Replacement content for one direct recipient.
    pub personalized: Option<(StationId, String)>,
}

/// A planned row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub to_station: StationId,
    pub content: String,
    pub is_master_copied: bool,
    pub kind: DeliveryKind,
}

impl FanoutEvent {
    /// A parcel was booked at its sender station.
    ///
    /// The sender station's own row names the person who handed the parcel in.
    pub fn parcel_created(parcel: &Parcel, sender_station_name: &str, initial_message: &str) -> Self {
        let note = initial_message.trim();
        let content = format!("Parcel sent from {sender_station_name}: {note}");
        let personalized = format!(
            "Parcel sent by {} from {sender_station_name}: {note}",
            parcel.sender_name
        );
        Self {
            origin: parcel.sender_station_id,
            parcel_id: parcel.id,
            direct: vec![parcel.sender_station_id, parcel.receiver_station_id],
            scope: FanoutScope::ParcelEvent,
            content,
            personalized: Some((parcel.sender_station_id, personalized)),
        }
    }

    /// `actor_station` changed the parcel's status to `status`.
    pub fn status_changed(parcel: &Parcel, status: ParcelStatus, actor_station: StationId) -> Self {
        Self {
            origin: actor_station,
            parcel_id: parcel.id,
            direct: vec![parcel.receiver_station_id, parcel.sender_station_id],
            scope: FanoutScope::ParcelEvent,
            content: format!("Parcel status updated to: {status}"),
            personalized: None,
        }
    }

    /// A station wrote to another station about a parcel.
    pub fn direct_message(from: StationId, to: StationId, parcel_id: ParcelId, content: String) -> Self {
        Self {
            origin: from,
            parcel_id,
            direct: vec![to],
            scope: FanoutScope::Direct,
            content,
            personalized: None,
        }
    }
}

/// Plan the rows for one event against the current station list.
///
/// Direct recipients that are not in `stations` are skipped. The master is
/// the first station flagged `is_master`.
pub fn plan_fanout(event: &FanoutEvent, stations: &[Station]) -> Vec<Delivery> {
    let known: HashSet<StationId> = stations.iter().map(|s| s.id).collect();
    let mut covered: HashSet<StationId> = HashSet::new();
    let mut out = Vec::with_capacity(stations.len());

    if event.scope == FanoutScope::Direct {
        // The origin never receives a copy of its own message; it can still be
        // addressed directly.
        covered.insert(event.origin);
    }

    for &to in &event.direct {
        if !known.contains(&to) || out.iter().any(|d: &Delivery| d.to_station == to) {
            continue;
        }
        covered.insert(to);
        let content = match &event.personalized {
            Some((station, text)) if *station == to => text.clone(),
            _ => event.content.clone(),
        };
        out.push(Delivery {
            to_station: to,
            content,
            is_master_copied: false,
            kind: DeliveryKind::Direct,
        });
    }

    if let Some(master) = stations.iter().find(|s| s.is_master) {
        if covered.insert(master.id) {
            out.push(Delivery {
                to_station: master.id,
                content: event.content.clone(),
                is_master_copied: true,
                kind: DeliveryKind::Master,
            });
        }
    }

    for station in stations {
        if covered.insert(station.id) {
            out.push(Delivery {
                to_station: station.id,
                content: format!("{COPY_PREFIX}{}", event.content),
                is_master_copied: true,
                kind: DeliveryKind::Copy,
            });
        }
    }

    out
}

impl Delivery {
    pub fn into_message(self, event: &FanoutEvent, now: DateTime<Utc>) -> Message {
        Message {
            id: MessageId::new(),
            from_station: event.origin,
            to_station: self.to_station,
            parcel_id: event.parcel_id,
            content: self.content,
            read: false,
            is_master_copied: self.is_master_copied,
            created_at: now,
            updated_at: now,
        }
    }
}
