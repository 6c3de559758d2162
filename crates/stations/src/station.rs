use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use railparcel_core::{DomainError, DomainResult, Entity, StationId, require_non_empty};

/// A railway station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub location: String,
    /// Unique, upper-case station code (e.g. `CNB`).
    pub code: String,
    pub is_master: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Station {
    type Id = StationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Compact view embedded in parcel and message responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSummary {
    pub id: StationId,
    pub name: String,
    pub code: String,
    pub location: String,
}

impl From<&Station> for StationSummary {
    fn from(s: &Station) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            code: s.code.clone(),
            location: s.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStation {
    pub name: String,
    pub location: String,
    pub code: String,
    #[serde(default)]
    pub is_master: bool,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub code: Option<String>,
    pub is_master: Option<bool>,
}

pub fn normalize_code(code: &str) -> DomainResult<String> {
    let code = require_non_empty("code", code)?.to_uppercase();
    if code.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("code must not contain whitespace"));
    }
    Ok(code)
}

impl NewStation {
    pub fn into_station(self, now: DateTime<Utc>) -> DomainResult<Station> {
        Ok(Station {
            id: StationId::new(),
            name: require_non_empty("name", &self.name)?,
            location: require_non_empty("location", &self.location)?,
            code: normalize_code(&self.code)?,
            is_master: self.is_master,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Station {
    /// Apply a partial update. Validation happens before any field changes.
    pub fn apply(&mut self, patch: StationPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let name = patch.name.as_deref().map(|v| require_non_empty("name", v)).transpose()?;
        let location = patch.location.as_deref().map(|v| require_non_empty("location", v)).transpose()?;
        let code = patch.code.as_deref().map(normalize_code).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(location) = location {
            self.location = location;
        }
        if let Some(code) = code {
            self.code = code;
        }
        if let Some(is_master) = patch.is_master {
            self.is_master = is_master;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Reject a candidate master if a different station already holds the flag.
pub fn ensure_single_master(candidate: &Station, existing: &[Station]) -> DomainResult<()> {
    if !candidate.is_master {
        return Ok(());
    }
    match existing.iter().find(|s| s.is_master && s.id != candidate.id) {
        Some(other) => Err(DomainError::conflict(format!(
            "station {} is already the master station",
            other.code
        ))),
        None => Ok(()),
    }
}
