//! Core record types for bingso.
//!
//! This module defines the persisted entities: active funeral records,
//! their archived announcements, condolence messages and enshrined
//! (temporarily held) records.

mod condolence;
mod enshrined;
pub mod wall_clock;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rooms::RoomNumber;

pub use condolence::{CondolenceMessage, NewCondolence};
pub use enshrined::{
    EnshrinedRecord, EnshrinedStatus, EnshrinedUpdate, NewEnshrined, UNKNOWN_NAME,
};

/// Relation label of the chief mourner (상주).
pub const CHIEF_MOURNER: &str = "상주";

/// Lifecycle state of a funeral record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuneralStatus {
    /// The funeral occupies a room.
    #[default]
    Active,
    /// The funeral has checked out.
    Completed,
}

impl std::fmt::Display for FuneralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for FuneralStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(crate::Error::validation(format!("unknown status: {other}"))),
        }
    }
}

/// Burial method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurialType {
    /// Interment (매장).
    Burial,
    /// Cremation (화장).
    Cremation,
}

impl BurialType {
    /// Stored representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Burial => "burial",
            Self::Cremation => "cremation",
        }
    }

    /// Parse the stored representation; anything else means unset.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "burial" => Some(Self::Burial),
            "cremation" => Some(Self::Cremation),
            _ => None,
        }
    }

    /// Korean display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Burial => "매장",
            Self::Cremation => "화장",
        }
    }
}

/// A family member listed on the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyMember {
    /// Position in the form, used by the dashboard.
    pub id: u32,
    /// Relation to the deceased, e.g. 상주, 아들, 딸.
    pub relation: String,
    /// Name.
    pub name: String,
    /// Phone number.
    pub phone: String,
}

impl FamilyMember {
    /// Create a family member.
    #[must_use]
    pub fn new(relation: &str, name: &str, phone: &str) -> Self {
        Self {
            id: 0,
            relation: relation.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
        }
    }

    /// Whether the member has both a name and a relation.
    #[must_use]
    pub fn is_listed(&self) -> bool {
        !self.name.trim().is_empty() && !self.relation.trim().is_empty()
    }
}

/// A bank account for condolence money (부의금).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankAccount {
    /// Position in the form.
    pub id: u32,
    /// Bank name.
    pub bank_name: String,
    /// Account number.
    pub account_number: String,
    /// Account holder.
    pub account_holder: String,
}

impl BankAccount {
    /// Whether every field is empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.bank_name.trim().is_empty()
            && self.account_number.trim().is_empty()
            && self.account_holder.trim().is_empty()
    }
}

/// An active funeral record: one per occupied room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuneralRecord {
    /// Identifier assigned by storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning funeral home.
    #[serde(default)]
    pub funeral_home_id: String,
    /// Room hosting the funeral.
    pub room_number: RoomNumber,
    /// Floor label copied from the room catalog.
    #[serde(default)]
    pub floor: String,

    /// Deceased name (required on save).
    #[serde(default)]
    pub deceased_name: String,
    /// Deceased name in hanja.
    #[serde(default)]
    pub deceased_hanja: String,
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Gender label.
    #[serde(default)]
    pub gender: String,
    /// Religion.
    #[serde(default)]
    pub religion: String,
    /// Religious title (세례명, 법명, ...).
    #[serde(default)]
    pub religion_title: String,
    /// Baptismal name.
    #[serde(default)]
    pub baptismal_name: String,
    /// Other honorific.
    #[serde(default)]
    pub other_title: String,

    /// Room check-in time.
    #[serde(default, with = "wall_clock::option")]
    pub placement_time: Option<NaiveDateTime>,
    /// Enshrinement (안치) time.
    #[serde(default, with = "wall_clock::option")]
    pub placement_date: Option<NaiveDateTime>,
    /// Shrouding (염습) time.
    #[serde(default, with = "wall_clock::option")]
    pub shroud_time: Option<NaiveDateTime>,
    /// Casketing (입관) time.
    #[serde(default, with = "wall_clock::option")]
    pub casket_time: Option<NaiveDateTime>,
    /// Funeral procession (발인) time.
    #[serde(default, with = "wall_clock::option")]
    pub funeral_time: Option<NaiveDateTime>,
    /// Room checkout time.
    #[serde(default, with = "wall_clock::option")]
    pub checkout_time: Option<NaiveDateTime>,
    /// Time of death.
    #[serde(default, with = "wall_clock::option")]
    pub death_time: Option<NaiveDateTime>,

    /// Burial method, unset when undecided.
    #[serde(default, deserialize_with = "burial_type_or_blank")]
    pub burial_type: Option<BurialType>,
    /// Burial location.
    #[serde(default)]
    pub burial_location: String,
    /// Secondary burial location.
    #[serde(default)]
    pub burial_location_2: String,
    /// Cause of death.
    #[serde(default)]
    pub death_cause: String,
    /// Place of death.
    #[serde(default)]
    pub death_place: String,
    /// Chemical treatment note.
    #[serde(default)]
    pub chemical_treatment: String,
    /// Address of the deceased.
    #[serde(default)]
    pub deceased_address: String,
    /// Free-text note about the deceased.
    #[serde(default)]
    pub deceased_note: String,
    /// Resident registration number, `front-back`.
    #[serde(default)]
    pub resident_number: String,
    /// Free-text business note.
    #[serde(default)]
    pub business_note: String,
    /// Funeral director.
    #[serde(default)]
    pub funeral_director: String,
    /// Organizing company.
    #[serde(default)]
    pub funeral_company: String,
    /// Message from the chief mourner.
    #[serde(default)]
    pub chief_message: String,
    /// Photo, as a data URL or link.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Whether the obituary shows the photo.
    #[serde(default = "default_true")]
    pub use_photo_in_obituary: bool,
    /// Condolence money accounts.
    #[serde(default)]
    pub bank_accounts: Vec<BankAccount>,
    /// Family members.
    #[serde(default)]
    pub family_members: Vec<FamilyMember>,

    /// Lifecycle state.
    #[serde(default)]
    pub status: FuneralStatus,
    /// When the record was first saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn burial_type_or_blank<'de, D>(deserializer: D) -> Result<Option<BurialType>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => BurialType::parse(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown burial type: {value}"))),
    }
}

impl FuneralRecord {
    /// Create a blank active record for a room.
    #[must_use]
    pub fn new(funeral_home_id: &str, room_number: RoomNumber, deceased_name: &str) -> Self {
        Self {
            id: None,
            funeral_home_id: funeral_home_id.to_string(),
            room_number,
            floor: room_number.info().floor.to_string(),
            deceased_name: deceased_name.to_string(),
            deceased_hanja: String::new(),
            age: None,
            gender: String::new(),
            religion: String::new(),
            religion_title: String::new(),
            baptismal_name: String::new(),
            other_title: String::new(),
            placement_time: None,
            placement_date: None,
            shroud_time: None,
            casket_time: None,
            funeral_time: None,
            checkout_time: None,
            death_time: None,
            burial_type: None,
            burial_location: String::new(),
            burial_location_2: String::new(),
            death_cause: String::new(),
            death_place: String::new(),
            chemical_treatment: String::new(),
            deceased_address: String::new(),
            deceased_note: String::new(),
            resident_number: String::new(),
            business_note: String::new(),
            funeral_director: String::new(),
            funeral_company: String::new(),
            chief_message: String::new(),
            photo_url: None,
            use_photo_in_obituary: true,
            bank_accounts: Vec::new(),
            family_members: Vec::new(),
            status: FuneralStatus::Active,
            created_at: None,
            updated_at: None,
        }
    }

    /// The chief mourner (상주), if listed.
    #[must_use]
    pub fn chief_mourner(&self) -> Option<&FamilyMember> {
        self.family_members
            .iter()
            .find(|m| m.relation == CHIEF_MOURNER)
    }

    /// Drop bank accounts with no data.
    pub fn prune_blank_accounts(&mut self) {
        self.bank_accounts.retain(|a| !a.is_blank());
    }
}

/// An archived funeral, created at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Announcement id.
    pub id: String,
    /// Id of the funeral record this was copied from.
    #[serde(default)]
    pub funeral_id: Option<String>,
    /// When the snapshot was taken.
    pub archived_at: DateTime<Utc>,
    /// The snapshot.
    pub record: FuneralRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(n: u8) -> RoomNumber {
        RoomNumber::new(n).unwrap()
    }

    #[test]
    fn test_new_record_defaults() {
        let record = FuneralRecord::new("home-1", room(3), "홍길동");
        assert!(record.id.is_none());
        assert_eq!(record.floor, "3층");
        assert_eq!(record.status, FuneralStatus::Active);
        assert!(record.use_photo_in_obituary);
        assert!(record.family_members.is_empty());
    }

    #[test]
    fn test_chief_mourner() {
        let mut record = FuneralRecord::new("home-1", room(1), "홍길동");
        record.family_members = vec![
            FamilyMember::new("딸", "홍영희", "010-1111-2222"),
            FamilyMember::new("상주", "홍철수", "010-1234-5678"),
        ];
        assert_eq!(record.chief_mourner().unwrap().name, "홍철수");
    }

    #[test]
    fn test_prune_blank_accounts() {
        let mut record = FuneralRecord::new("home-1", room(1), "홍길동");
        record.bank_accounts = vec![
            BankAccount::default(),
            BankAccount {
                id: 2,
                bank_name: "농협".to_string(),
                account_number: "123-45".to_string(),
                account_holder: "홍철수".to_string(),
            },
        ];
        record.prune_blank_accounts();
        assert_eq!(record.bank_accounts.len(), 1);
        assert_eq!(record.bank_accounts[0].bank_name, "농협");
    }

    #[test]
    fn test_family_member_is_listed() {
        assert!(FamilyMember::new("아들", "홍민수", "").is_listed());
        assert!(!FamilyMember::new("", "홍민수", "").is_listed());
        assert!(!FamilyMember::new("아들", " ", "").is_listed());
    }

    #[test]
    fn test_record_deserialize_minimal_form() {
        let json = r#"{
            "room_number": 2,
            "deceased_name": "김영희",
            "funeral_time": "2025-01-18T07:00",
            "burial_type": "cremation",
            "placement_time": ""
        }"#;
        let blank: FuneralRecord =
            serde_json::from_str(r#"{"room_number": 1, "burial_type": ""}"#).unwrap();
        assert!(blank.burial_type.is_none());

        let record: FuneralRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.room_number.get(), 2);
        assert_eq!(record.burial_type, Some(BurialType::Cremation));
        assert!(record.funeral_time.is_some());
        assert!(record.placement_time.is_none());
        assert!(record.use_photo_in_obituary);
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("active".parse::<FuneralStatus>().unwrap(), FuneralStatus::Active);
        assert_eq!(FuneralStatus::Completed.to_string(), "completed");
        assert!("closed".parse::<FuneralStatus>().is_err());
    }

    #[test]
    fn test_burial_type_round_trip_strings() {
        assert_eq!(BurialType::parse("burial"), Some(BurialType::Burial));
        assert_eq!(BurialType::parse(""), None);
        assert_eq!(BurialType::Cremation.as_str(), "cremation");
        assert_eq!(BurialType::Cremation.label(), "화장");
    }
}
