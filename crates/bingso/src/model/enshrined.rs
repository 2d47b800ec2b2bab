//! Enshrined (안치) records: bodies held before a room is assigned.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wall_clock;
use crate::error::{Error, Result};

/// Name recorded when the deceased is not yet identified.
pub const UNKNOWN_NAME: &str = "미상";

/// Intake progress of an enshrined record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnshrinedStatus {
    /// Waiting for family contact.
    #[default]
    Waiting,
    /// Family information is being collected.
    InfoGathering,
    /// Ready to move into a room.
    Ready,
}

impl std::fmt::Display for EnshrinedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::InfoGathering => write!(f, "info_gathering"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

impl std::str::FromStr for EnshrinedStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "info_gathering" => Ok(Self::InfoGathering),
            "ready" => Ok(Self::Ready),
            other => Err(Error::validation(format!("unknown enshrined status: {other}"))),
        }
    }
}

/// A stored enshrined record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnshrinedRecord {
    /// Record id.
    pub id: String,
    /// Owning funeral home.
    pub funeral_home_id: String,
    /// Deceased name, [`UNKNOWN_NAME`] when unidentified.
    pub deceased_name: String,
    /// When the body was received.
    #[serde(default, with = "wall_clock::option")]
    pub enshrinement_time: Option<NaiveDateTime>,
    /// Contact person.
    pub contact_name: String,
    /// Contact phone, formatted.
    pub contact_phone: String,
    /// Contact's relation to the deceased.
    pub contact_relation: String,
    /// Free-text notes.
    pub notes: String,
    /// Intake progress.
    pub status: EnshrinedStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Intake form for a new enshrined record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEnshrined {
    /// Deceased name; blank when unknown.
    pub deceased_name: String,
    /// When the body was received; `None` means now.
    #[serde(with = "wall_clock::option")]
    pub enshrinement_time: Option<NaiveDateTime>,
    /// Contact person.
    pub contact_name: String,
    /// Contact phone, raw or formatted.
    pub contact_phone: String,
    /// Contact's relation to the deceased.
    pub contact_relation: String,
    /// Free-text notes.
    pub notes: String,
}

impl NewEnshrined {
    /// Either the deceased name or the contact name must be present.
    ///
    /// # Errors
    ///
    /// Returns a validation error when both are blank.
    pub fn validate(&self) -> Result<()> {
        if self.deceased_name.trim().is_empty() && self.contact_name.trim().is_empty() {
            return Err(Error::validation(
                "either the deceased name or the contact name is required",
            ));
        }
        Ok(())
    }
}

/// Partial update of an enshrined record; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnshrinedUpdate {
    /// New deceased name.
    pub deceased_name: Option<String>,
    /// New enshrinement time.
    #[serde(with = "wall_clock::option")]
    pub enshrinement_time: Option<NaiveDateTime>,
    /// New contact name.
    pub contact_name: Option<String>,
    /// New contact phone.
    pub contact_phone: Option<String>,
    /// New contact relation.
    pub contact_relation: Option<String>,
    /// New notes.
    pub notes: Option<String>,
    /// New status.
    pub status: Option<EnshrinedStatus>,
}

impl EnshrinedUpdate {
    /// Apply the update in place.
    pub fn apply(self, record: &mut EnshrinedRecord) {
        if let Some(name) = self.deceased_name {
            record.deceased_name = if name.trim().is_empty() {
                UNKNOWN_NAME.to_string()
            } else {
                name
            };
        }
        if self.enshrinement_time.is_some() {
            record.enshrinement_time = self.enshrinement_time;
        }
        if let Some(contact_name) = self.contact_name {
            record.contact_name = contact_name;
        }
        if let Some(phone) = self.contact_phone {
            record.contact_phone = crate::format::format_phone(&phone);
        }
        if let Some(relation) = self.contact_relation {
            record.contact_relation = relation;
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}
