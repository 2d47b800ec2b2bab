//! Condolence messages left on the obituary page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rooms::RoomNumber;

/// A stored condolence message, scoped to a home and room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondolenceMessage {
    /// Message id.
    pub id: String,
    /// Owning funeral home.
    pub funeral_home_id: String,
    /// Room the message belongs to.
    pub room_number: RoomNumber,
    /// Who sent it.
    pub sender_name: String,
    /// Sender's relation to the deceased.
    #[serde(default)]
    pub sender_relation: String,
    /// Message text.
    pub message: String,
    /// When it was written.
    pub created_at: DateTime<Utc>,
}

impl CondolenceMessage {
    /// Copy this message under another room, keeping sender, text and time.
    #[must_use]
    pub fn relocated(&self, room_number: RoomNumber) -> NewCondolence {
        NewCondolence {
            funeral_home_id: self.funeral_home_id.clone(),
            room_number,
            sender_name: self.sender_name.clone(),
            sender_relation: self.sender_relation.clone(),
            message: self.message.clone(),
            created_at: Some(self.created_at),
        }
    }
}

/// A condolence message to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCondolence {
    /// Owning funeral home.
    pub funeral_home_id: String,
    /// Room the message belongs to.
    pub room_number: RoomNumber,
    /// Who sent it.
    pub sender_name: String,
    /// Sender's relation to the deceased.
    #[serde(default)]
    pub sender_relation: String,
    /// Message text.
    pub message: String,
    /// Original creation time; `None` stamps the insert time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewCondolence {
    /// Check that sender name and message are present.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing field.
    pub fn validate(&self) -> Result<()> {
        if self.sender_name.trim().is_empty() {
            return Err(Error::validation("sender name is required"));
        }
        if self.message.trim().is_empty() {
            return Err(Error::validation("message is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewCondolence {
        NewCondolence {
            funeral_home_id: "home-1".to_string(),
            room_number: RoomNumber::new(1).unwrap(),
            sender_name: "이순신".to_string(),
            sender_relation: "친구".to_string(),
            message: "삼가 고인의 명복을 빕니다".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_name_and_message() {
        let mut msg = sample();
        msg.sender_name = "  ".to_string();
        assert!(msg.validate().unwrap_err().to_string().contains("sender name"));

        let mut msg = sample();
        msg.message = String::new();
        assert!(msg.validate().unwrap_err().to_string().contains("message"));
    }

    #[test]
    fn test_relocated_keeps_content_and_time() {
        let created_at = Utc::now();
        let stored = CondolenceMessage {
            id: "m-1".to_string(),
            funeral_home_id: "home-1".to_string(),
            room_number: RoomNumber::new(1).unwrap(),
            sender_name: "이순신".to_string(),
            sender_relation: "친구".to_string(),
            message: "명복을 빕니다".to_string(),
            created_at,
        };
        let moved = stored.relocated(RoomNumber::new(4).unwrap());
        assert_eq!(moved.room_number.get(), 4);
        assert_eq!(moved.sender_name, "이순신");
        assert_eq!(moved.message, "명복을 빕니다");
        assert_eq!(moved.created_at, Some(created_at));
    }
}
