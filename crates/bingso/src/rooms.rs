//! The fixed catalog of viewing rooms (빈소).
//!
//! Rooms are identified by a small integer. Rooms 1 through 5 host funerals;
//! room 6 is the reserve room used for enshrinement intake.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Highest room number in the catalog.
const MAX_ROOM: u8 = 6;

/// Number of the reserve room.
const RESERVE_ROOM: u8 = 6;

/// A validated room number in `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RoomNumber(u8);

impl RoomNumber {
    /// The reserve room.
    pub const RESERVE: Self = Self(RESERVE_ROOM);

    /// Create a room number, rejecting values outside the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoom`] for anything outside `1..=6`.
    pub fn new(value: u8) -> Result<Self> {
        if (1..=MAX_ROOM).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::UnknownRoom(value.to_string()))
        }
    }

    /// Create a room number that may host a funeral (`1..=5`).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown rooms and for the reserve room.
    pub fn funeral_room(value: u8) -> Result<Self> {
        let room = Self::new(value)?;
        if room.is_reserve() {
            return Err(Error::validation(
                "room 6 is the reserve room; register the body in the enshrinement queue instead",
            ));
        }
        Ok(room)
    }

    /// The raw room number.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the reserve room.
    #[must_use]
    pub fn is_reserve(self) -> bool {
        self.0 == RESERVE_ROOM
    }

    /// Parse a room label such as `room-3`, `3`, `3빈소` or `특실 5빈소`.
    ///
    /// The first run of digits in the label is taken as the room number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoom`] when the label has no digits or the
    /// number is outside the catalog.
    pub fn parse_label(label: &str) -> Result<Self> {
        static DIGITS: OnceLock<Regex> = OnceLock::new();
        let digits = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("static regex"));

        let value = digits
            .find(label)
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .ok_or_else(|| Error::UnknownRoom(label.to_string()))?;
        Self::new(value).map_err(|_| Error::UnknownRoom(label.to_string()))
    }

    /// The catalog entry for this room.
    #[must_use]
    pub fn info(self) -> &'static RoomInfo {
        &CATALOG[usize::from(self.0 - 1)]
    }

    /// The page key used by the dashboard, e.g. `room-3`.
    #[must_use]
    pub fn page_key(self) -> String {
        format!("room-{}", self.0)
    }
}

impl fmt::Display for RoomNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for RoomNumber {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RoomNumber> for u8 {
    fn from(room: RoomNumber) -> Self {
        room.0
    }
}

impl FromStr for RoomNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_label(s)
    }
}

/// Static description of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    /// Room number.
    pub number: u8,
    /// Display name.
    pub name: &'static str,
    /// Floor label, empty for the reserve room.
    pub floor: &'static str,
}

/// All rooms, in number order.
pub const CATALOG: [RoomInfo; 6] = [
    RoomInfo { number: 1, name: "1빈소", floor: "2층" },
    RoomInfo { number: 2, name: "2빈소", floor: "2층" },
    RoomInfo { number: 3, name: "3빈소", floor: "3층" },
    RoomInfo { number: 4, name: "4빈소", floor: "3층" },
    RoomInfo { number: 5, name: "특실 5빈소", floor: "5층" },
    RoomInfo { number: 6, name: "예비", floor: "" },
];

/// Every room that may host a funeral.
pub fn funeral_rooms() -> impl Iterator<Item = RoomNumber> {
    (1..RESERVE_ROOM).map(RoomNumber)
}

/// Occupancy of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// No active funeral.
    Available,
    /// An active funeral is in the room.
    Occupied,
}

/// One row of the room overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomStatus {
    /// Room description.
    #[serde(flatten)]
    pub info: RoomInfo,
    /// Whether the room is in use.
    pub status: Occupancy,
    /// Deceased name of the active funeral, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_name: Option<String>,
    /// Id of the active funeral, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funeral_id: Option<String>,
}

/// Build the room overview from the active funerals of a home.
///
/// Every catalog room is listed; rooms without an active funeral are
/// available.
#[must_use]
pub fn overview(active: &[crate::model::FuneralRecord]) -> Vec<RoomStatus> {
    CATALOG
        .iter()
        .map(|info| {
            let funeral = active.iter().find(|f| f.room_number.get() == info.number);
            RoomStatus {
                info: info.clone(),
                status: if funeral.is_some() {
                    Occupancy::Occupied
                } else {
                    Occupancy::Available
                },
                deceased_name: funeral.map(|f| f.deceased_name.clone()),
                funeral_id: funeral.and_then(|f| f.id.clone()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FuneralRecord;

    #[test]
    fn test_room_number_bounds() {
        assert!(RoomNumber::new(0).is_err());
        assert!(RoomNumber::new(1).is_ok());
        assert!(RoomNumber::new(6).is_ok());
        assert!(RoomNumber::new(7).is_err());
    }

    #[test]
    fn test_reserve_room() {
        assert!(RoomNumber::RESERVE.is_reserve());
        assert!(!RoomNumber::new(5).unwrap().is_reserve());
        assert!(RoomNumber::funeral_room(6).is_err());
        assert!(RoomNumber::funeral_room(5).is_ok());
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(RoomNumber::parse_label("room-3").unwrap().get(), 3);
        assert_eq!(RoomNumber::parse_label("4").unwrap().get(), 4);
        assert_eq!(RoomNumber::parse_label("2빈소").unwrap().get(), 2);
        assert_eq!(RoomNumber::parse_label("특실 5빈소").unwrap().get(), 5);
        assert!(RoomNumber::parse_label("room-9").is_err());
        assert!(RoomNumber::parse_label("lobby").is_err());
    }

    #[test]
    fn test_info_and_page_key() {
        let room = RoomNumber::new(5).unwrap();
        assert_eq!(room.info().name, "특실 5빈소");
        assert_eq!(room.info().floor, "5층");
        assert_eq!(room.page_key(), "room-5");
        assert_eq!(RoomNumber::RESERVE.info().name, "예비");
    }

    #[test]
    fn test_funeral_rooms_excludes_reserve() {
        let rooms: Vec<u8> = funeral_rooms().map(RoomNumber::get).collect();
        assert_eq!(rooms, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_serde_rejects_unknown_room() {
        assert!(serde_json::from_str::<RoomNumber>("3").is_ok());
        assert!(serde_json::from_str::<RoomNumber>("12").is_err());
        assert_eq!(
            serde_json::to_string(&RoomNumber::new(2).unwrap()).unwrap(),
            "2"
        );
    }

    #[test]
    fn test_overview_marks_occupied_rooms() {
        let mut record = FuneralRecord::new("home-1", RoomNumber::new(2).unwrap(), "홍길동");
        record.id = Some("f-1".to_string());

        let rooms = overview(&[record]);
        assert_eq!(rooms.len(), 6);
        assert_eq!(rooms[1].status, Occupancy::Occupied);
        assert_eq!(rooms[1].deceased_name.as_deref(), Some("홍길동"));
        assert_eq!(rooms[1].funeral_id.as_deref(), Some("f-1"));
        assert_eq!(rooms[0].status, Occupancy::Available);
        assert!(rooms[0].deceased_name.is_none());
    }
}
