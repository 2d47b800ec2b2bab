//! Public obituary (부고) page data and condolence submission.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ObituaryConfig;
use crate::error::{Error, Result};
use crate::format::{death_term, obituary_label, religion_symbol, sorted_family};
use crate::model::{BankAccount, CondolenceMessage, FamilyMember, FuneralStatus, NewCondolence};
use crate::storage::FuneralBackend;

/// Name shown when the record has none.
const DEFAULT_NAME: &str = "고인";

/// Where the funeral is held, with map links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Venue {
    /// Venue name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Phone number.
    pub phone: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Web map link with directions to the venue.
    pub map_url: String,
    /// Map app deep link for driving directions.
    pub route_url: String,
}

impl From<&ObituaryConfig> for Venue {
    fn from(config: &ObituaryConfig) -> Self {
        Self {
            name: config.venue_name.clone(),
            address: config.address.clone(),
            phone: config.phone.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
            map_url: format!(
                "https://map.kakao.com/link/to/{},{},{}",
                config.venue_name, config.latitude, config.longitude
            ),
            route_url: format!(
                "kakaomap://route?ep={},{}&by=CAR",
                config.latitude, config.longitude
            ),
        }
    }
}

/// Everything the obituary page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObituaryView {
    /// Funeral id the page is shared under.
    pub funeral_id: String,
    /// Deceased name, 고인 when blank.
    pub deceased_name: String,
    /// Deceased name in hanja.
    pub deceased_hanja: String,
    /// Age in years.
    pub age: Option<u32>,
    /// Gender label.
    pub gender: String,
    /// Religion.
    pub religion: String,
    /// Symbol for the religion.
    pub religion_symbol: String,
    /// Religious title.
    pub religion_title: String,
    /// Word used for the death (별세, 소천, ...).
    pub death_term: String,
    /// Photo, present only when the family allowed it.
    pub photo_url: Option<String>,
    /// Room display name.
    pub room_name: String,
    /// Floor label.
    pub floor: String,
    /// Family members in precedence order.
    pub family_members: Vec<FamilyMember>,
    /// Time of death.
    pub death_label: String,
    /// Enshrinement time.
    pub placement_label: String,
    /// Shrouding time.
    pub shroud_label: String,
    /// Casketing time.
    pub casket_label: String,
    /// Procession time.
    pub funeral_label: String,
    /// Burial method label.
    pub burial_type: String,
    /// Burial location.
    pub burial_location: String,
    /// Condolence money accounts.
    pub bank_accounts: Vec<BankAccount>,
    /// Message from the chief mourner.
    pub chief_message: String,
    /// Venue details.
    pub venue: Venue,
    /// Condolence messages, newest first.
    pub condolences: Vec<CondolenceMessage>,
}

/// A condolence submitted from the obituary page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CondolenceForm {
    /// Sender name.
    pub sender_name: String,
    /// Sender's relation to the deceased.
    pub sender_relation: String,
    /// Message text.
    pub message: String,
}

/// Build the obituary of an active funeral.
///
/// A failure to load the condolence messages leaves the list empty.
///
/// # Errors
///
/// Returns [`Error::NotFound`] when no active funeral has the id, or a
/// backend error.
pub fn load_obituary<B: FuneralBackend>(
    backend: &B,
    funeral_id: &str,
    config: &ObituaryConfig,
) -> Result<ObituaryView> {
    let record = backend
        .funeral(funeral_id)?
        .filter(|r| r.status == FuneralStatus::Active)
        .ok_or_else(|| Error::not_found("funeral", funeral_id))?;

    let condolences = backend
        .condolences(&record.funeral_home_id, record.room_number)
        .unwrap_or_else(|e| {
            warn!(funeral_id, error = %e, "Could not load condolences for the obituary");
            Vec::new()
        });

    let info = record.room_number.info();
    let name = match record.deceased_name.trim() {
        "" => DEFAULT_NAME,
        name => name,
    };
    let mut bank_accounts = record.bank_accounts.clone();
    bank_accounts.retain(|a| !a.is_blank());

    Ok(ObituaryView {
        funeral_id: funeral_id.to_string(),
        deceased_name: name.to_string(),
        deceased_hanja: record.deceased_hanja.clone(),
        age: record.age,
        gender: record.gender.clone(),
        religion_symbol: religion_symbol(&record.religion).to_string(),
        death_term: death_term(&record.religion).to_string(),
        religion: record.religion.clone(),
        religion_title: record.religion_title.clone(),
        photo_url: record
            .photo_url
            .clone()
            .filter(|_| record.use_photo_in_obituary),
        room_name: info.name.to_string(),
        floor: info.floor.to_string(),
        family_members: sorted_family(&record.family_members),
        death_label: obituary_label(record.death_time.as_ref()),
        placement_label: obituary_label(record.placement_date.or(record.placement_time).as_ref()),
        shroud_label: obituary_label(record.shroud_time.as_ref()),
        casket_label: obituary_label(record.casket_time.as_ref()),
        funeral_label: obituary_label(record.funeral_time.as_ref()),
        burial_type: record
            .burial_type
            .map(|b| b.label().to_string())
            .unwrap_or_default(),
        burial_location: record.burial_location.clone(),
        bank_accounts,
        chief_message: record.chief_message.clone(),
        venue: Venue::from(config),
        condolences,
    })
}

/// Leave a condolence message for an active funeral.
///
/// The message is filed under the funeral's home and current room.
///
/// # Errors
///
/// Returns [`Error::NotFound`] when no active funeral has the id, a
/// validation error for a blank sender or message, or a backend error.
pub fn submit_condolence<B: FuneralBackend>(
    backend: &B,
    funeral_id: &str,
    form: CondolenceForm,
) -> Result<CondolenceMessage> {
    let record = backend
        .funeral(funeral_id)?
        .filter(|r| r.status == FuneralStatus::Active)
        .ok_or_else(|| Error::not_found("funeral", funeral_id))?;

    let message = NewCondolence {
        funeral_home_id: record.funeral_home_id,
        room_number: record.room_number,
        sender_name: form.sender_name.trim().to_string(),
        sender_relation: form.sender_relation.trim().to_string(),
        message: form.message.trim().to_string(),
        created_at: None,
    };
    message.validate()?;

    let stored = backend.insert_condolence(&message)?;
    info!(funeral_id, room = %stored.room_number, "Condolence message received");
    Ok(stored)
}
