//! Multi-step record workflows.
//!
//! Each workflow is a sequence of independent [`FuneralBackend`] calls.
//! Checkout compensates a failed run by deleting the announcement it
//! wrote; room transfer puts condolences back under the source room when
//! the move itself fails. Nothing else is undone.

use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::format::format_phone;
use crate::model::{
    Announcement, EnshrinedRecord, EnshrinedStatus, EnshrinedUpdate, FamilyMember,
    FuneralRecord, FuneralStatus, NewEnshrined, UNKNOWN_NAME,
};
use crate::rooms::RoomNumber;
use crate::storage::{self, FuneralBackend};

/// Relation used for an enshrinement contact with no stated relation.
pub const CONTACT_RELATION: &str = "연락처";

/// Result of saving a room form.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    /// The stored record.
    pub record: FuneralRecord,
    /// Whether this save created the record.
    pub created: bool,
    /// Enshrined record removed after the save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enshrined_removed: Option<String>,
    /// Problem removing the enshrined record; the save itself stands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of a completed checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReport {
    /// The archived snapshot.
    pub announcement: Announcement,
    /// Condolence messages deleted with the room.
    pub condolences_removed: usize,
    /// Non-fatal problems met along the way.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of a room transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    /// The moved funeral.
    pub funeral_id: String,
    /// Source room.
    pub from: RoomNumber,
    /// Target room.
    pub to: RoomNumber,
    /// Messages re-inserted under the target room.
    pub messages_moved: usize,
    /// Messages that could not be re-inserted.
    pub messages_lost: usize,
}

/// A room form prefilled from an enshrined record.
#[derive(Debug, Clone, Serialize)]
pub struct EnshrinedDraft {
    /// Unsaved record for the target room.
    pub record: FuneralRecord,
    /// Enshrined record to remove once the draft is saved.
    pub enshrined_id: String,
}

fn require_funeral_room(room: RoomNumber) -> Result<RoomNumber> {
    if room.is_reserve() {
        return Err(Error::validation(
            "room 6 is the reserve room; register the body in the enshrinement queue instead",
        ));
    }
    Ok(room)
}

fn funeral_id(record: &FuneralRecord) -> Result<String> {
    record
        .id
        .clone()
        .ok_or_else(|| Error::internal("stored funeral has no id"))
}

/// The active record of a room, or a blank form for it.
///
/// # Errors
///
/// Returns a backend error.
pub fn room_form<B: FuneralBackend>(
    backend: &B,
    home: &str,
    room: RoomNumber,
) -> Result<FuneralRecord> {
    Ok(backend
        .active_in_room(home, room)?
        .unwrap_or_else(|| FuneralRecord::new(home, room, "")))
}

/// Save a room form as the active record of `room`.
///
/// An existing active record keeps its id and creation time. When the form
/// was prefilled from the enshrined queue, that record is deleted after a
/// successful save; a failure there is logged and reported, not undone.
///
/// # Errors
///
/// Returns a validation error for a blank name or the reserve room, or a
/// backend error from the save.
pub fn save_room<B: FuneralBackend>(
    backend: &B,
    home: &str,
    room: RoomNumber,
    form: FuneralRecord,
    from_enshrined: Option<&str>,
) -> Result<SaveOutcome> {
    let room = require_funeral_room(room)?;
    if form.deceased_name.trim().is_empty() {
        return Err(Error::validation("deceased name is required"));
    }

    let mut record = form;
    record.funeral_home_id = home.to_string();
    record.room_number = room;
    record.floor = room.info().floor.to_string();
    record.status = FuneralStatus::Active;
    record.deceased_name = record.deceased_name.trim().to_string();
    record.prune_blank_accounts();
    for member in &mut record.family_members {
        member.phone = format_phone(&member.phone);
    }

    let (record, created) = match backend.active_in_room(home, room)? {
        Some(existing) => {
            record.id = existing.id;
            record.created_at = existing.created_at;
            (backend.update_funeral(&record)?, false)
        }
        None => {
            record.id = None;
            record.created_at = None;
            (backend.insert_funeral(&record)?, true)
        }
    };
    info!(room = %room, id = ?record.id, created, "Saved room form");

    let mut outcome = SaveOutcome {
        record,
        created,
        enshrined_removed: None,
        warning: None,
    };
    if let Some(enshrined_id) = from_enshrined {
        match backend.delete_enshrined(enshrined_id) {
            Ok(_) => outcome.enshrined_removed = Some(enshrined_id.to_string()),
            Err(e) => {
                warn!(enshrined_id, error = %e, "Room saved but enshrined record was not removed");
                outcome.warning = Some(format!(
                    "the room was saved but the enshrined record could not be removed: {e}"
                ));
            }
        }
    }
    Ok(outcome)
}

/// Check a funeral out of its room.
///
/// Steps: load the active record, archive it as an announcement, delete
/// the room's condolences, delete the active record, and re-query to
/// confirm it is gone. A failure after the archive deletes the
/// announcement again.
///
/// # Errors
///
/// Returns [`Error::RoomVacant`] when nothing is in the room, the backend
/// error when archiving fails, [`Error::CheckoutRolledBack`] when a later
/// step failed and the announcement was removed, and
/// [`Error::CheckoutInconsistent`] when removing it failed too.
pub fn checkout<B: FuneralBackend>(
    backend: &B,
    home: &str,
    room: RoomNumber,
) -> Result<CheckoutReport> {
    info!("[checkout 1/5] loading active record in room {room}");
    let record = backend
        .active_in_room(home, room)?
        .ok_or(Error::RoomVacant { room })?;
    let id = funeral_id(&record)?;

    info!("[checkout 2/5] archiving funeral {id}");
    let announcement = backend.insert_announcement(&record, storage::now())?;

    let mut warnings = Vec::new();
    info!("[checkout 3/5] deleting condolences of room {room}");
    let condolences_removed = match backend.delete_condolences(home, room) {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "Condolence messages were not deleted; continuing checkout");
            warnings.push(format!("condolence messages were not deleted: {e}"));
            0
        }
    };

    info!("[checkout 4/5] deleting active record {id}");
    let failure = match backend.delete_funeral(&id) {
        Err(e) => Some(format!("deleting the active record failed: {e}")),
        Ok(false) => Some("the active record was already gone".to_string()),
        Ok(true) => {
            info!("[checkout 5/5] verifying record {id} is gone");
            match backend.funeral(&id) {
                Ok(None) => None,
                Ok(Some(_)) => Some("the active record is still present after delete".to_string()),
                Err(e) => {
                    // The delete reported success; keep the only remaining copy.
                    warn!(error = %e, "Could not verify the delete of {id}");
                    warnings.push(format!("the delete could not be verified: {e}"));
                    None
                }
            }
        }
    };

    match failure {
        None => {
            info!(announcement = %announcement.id, "Checkout of room {room} complete");
            Ok(CheckoutReport {
                announcement,
                condolences_removed,
                warnings,
            })
        }
        Some(reason) => Err(roll_back_announcement(backend, &announcement.id, reason)),
    }
}

fn roll_back_announcement<B: FuneralBackend>(
    backend: &B,
    announcement_id: &str,
    reason: String,
) -> Error {
    warn!(announcement_id, %reason, "Checkout failed; removing announcement");
    match backend.delete_announcement(announcement_id) {
        Ok(_) => Error::CheckoutRolledBack { reason },
        Err(e) => {
            error!(announcement_id, error = %e, "Rollback failed; data may be inconsistent");
            Error::CheckoutInconsistent {
                announcement_id: announcement_id.to_string(),
                reason,
                rollback_error: e.to_string(),
            }
        }
    }
}

/// Move the active funeral of `from` to `to`, taking its condolences along.
///
/// Messages keep sender, relation, text and creation time. A message that
/// fails to re-insert is counted as lost.
///
/// # Errors
///
/// Returns a validation error for same-room or reserve-room targets,
/// [`Error::RoomVacant`] / [`Error::RoomOccupied`] for the room checks, or
/// the backend error that stopped the move.
pub fn transfer_room<B: FuneralBackend>(
    backend: &B,
    home: &str,
    from: RoomNumber,
    to: RoomNumber,
) -> Result<TransferReport> {
    if from == to {
        return Err(Error::validation("the target room is the current room"));
    }
    let to = require_funeral_room(to)?;

    info!("[transfer 1/5] checking rooms {from} -> {to}");
    let record = backend
        .active_in_room(home, from)?
        .ok_or(Error::RoomVacant { room: from })?;
    if backend.active_in_room(home, to)?.is_some() {
        return Err(Error::RoomOccupied { room: to });
    }
    let id = funeral_id(&record)?;

    info!("[transfer 2/5] loading condolences of room {from}");
    let messages = backend.condolences(home, from)?;

    info!("[transfer 3/5] deleting {} condolences of room {from}", messages.len());
    backend.delete_condolences(home, from)?;

    info!("[transfer 4/5] moving funeral {id} to room {to}");
    if let Err(e) = backend.set_funeral_room(&id, to) {
        let restored = messages
            .iter()
            .filter(|m| backend.insert_condolence(&m.relocated(from)).is_ok())
            .count();
        warn!(
            error = %e,
            restored,
            total = messages.len(),
            "Room move failed; condolences restored to the source room"
        );
        return Err(e);
    }

    info!("[transfer 5/5] re-inserting {} condolences under room {to}", messages.len());
    let mut moved = 0;
    for message in &messages {
        match backend.insert_condolence(&message.relocated(to)) {
            Ok(_) => moved += 1,
            Err(e) => warn!(message_id = %message.id, error = %e, "Condolence message lost in transfer"),
        }
    }
    let lost = messages.len() - moved;
    if lost > 0 {
        error!(lost, "Room transfer lost condolence messages");
    }

    Ok(TransferReport {
        funeral_id: id,
        from,
        to,
        messages_moved: moved,
        messages_lost: lost,
    })
}

/// Prefill a room form from an enshrined record.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown record or one of another
/// home, a validation error for the reserve room, and
/// [`Error::RoomOccupied`] when the room is taken.
pub fn prepare_from_enshrined<B: FuneralBackend>(
    backend: &B,
    home: &str,
    enshrined_id: &str,
    room: RoomNumber,
) -> Result<EnshrinedDraft> {
    let room = require_funeral_room(room)?;
    let enshrined = find_enshrined(backend, home, enshrined_id)?;
    if backend.active_in_room(home, room)?.is_some() {
        return Err(Error::RoomOccupied { room });
    }

    let mut record = FuneralRecord::new(home, room, &enshrined.deceased_name);
    record.placement_date = enshrined.enshrinement_time;
    if !enshrined.contact_name.trim().is_empty() {
        let relation = if enshrined.contact_relation.trim().is_empty() {
            CONTACT_RELATION
        } else {
            enshrined.contact_relation.as_str()
        };
        let mut contact = FamilyMember::new(relation, &enshrined.contact_name, &enshrined.contact_phone);
        contact.id = 1;
        record.family_members.push(contact);
    }

    Ok(EnshrinedDraft {
        record,
        enshrined_id: enshrined.id,
    })
}

fn find_enshrined<B: FuneralBackend>(backend: &B, home: &str, id: &str) -> Result<EnshrinedRecord> {
    backend
        .enshrined_record(id)?
        .filter(|r| r.funeral_home_id == home)
        .ok_or_else(|| Error::not_found("enshrined record", id))
}

/// Add a body to the enshrined queue.
///
/// The name defaults to 미상 and the time to now; the phone is formatted
/// and the status starts at waiting.
///
/// # Errors
///
/// Returns a validation error when both names are blank, or a backend error.
pub fn register_enshrined<B: FuneralBackend>(
    backend: &B,
    home: &str,
    intake: NewEnshrined,
) -> Result<EnshrinedRecord> {
    intake.validate()?;
    let now = storage::now();
    let name = intake.deceased_name.trim();
    let record = EnshrinedRecord {
        id: Uuid::new_v4().to_string(),
        funeral_home_id: home.to_string(),
        deceased_name: if name.is_empty() { UNKNOWN_NAME.to_string() } else { name.to_string() },
        enshrinement_time: intake
            .enshrinement_time
            .or_else(|| Some(Local::now().naive_local())),
        contact_name: intake.contact_name.trim().to_string(),
        contact_phone: format_phone(&intake.contact_phone),
        contact_relation: intake.contact_relation.trim().to_string(),
        notes: intake.notes,
        status: EnshrinedStatus::Waiting,
        created_at: now,
        updated_at: now,
    };
    backend.insert_enshrined(&record)?;
    info!(id = %record.id, name = %record.deceased_name, "Registered enshrined body");
    Ok(record)
}

/// Apply a partial update to an enshrined record of `home`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown record, or a backend error.
pub fn update_enshrined<B: FuneralBackend>(
    backend: &B,
    home: &str,
    id: &str,
    update: EnshrinedUpdate,
) -> Result<EnshrinedRecord> {
    let mut record = find_enshrined(backend, home, id)?;
    update.apply(&mut record);
    record.updated_at = storage::now();
    backend.update_enshrined(&record)?;
    Ok(record)
}

/// Delete an enshrined record of `home`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown record, or a backend error.
pub fn remove_enshrined<B: FuneralBackend>(backend: &B, home: &str, id: &str) -> Result<()> {
    find_enshrined(backend, home, id)?;
    backend.delete_enshrined(id)?;
    info!(id, "Removed enshrined record");
    Ok(())
}

/// Delete an active funeral of `home` without archiving it, together with
/// the condolence messages of its room.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown record, or a backend error.
pub fn delete_active<B: FuneralBackend>(backend: &B, home: &str, id: &str) -> Result<()> {
    let record = backend
        .funeral(id)?
        .filter(|r| r.funeral_home_id == home)
        .ok_or_else(|| Error::not_found("funeral", id))?;
    let removed = backend.delete_condolences(home, record.room_number)?;
    backend.delete_funeral(id)?;
    info!(id, room = %record.room_number, condolences = removed, "Deleted active funeral");
    Ok(())
}

/// Delete an announcement of `home`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for an unknown announcement, or a backend error.
pub fn delete_announcement<B: FuneralBackend>(backend: &B, home: &str, id: &str) -> Result<()> {
    backend
        .announcement(id)?
        .filter(|a| a.record.funeral_home_id == home)
        .ok_or_else(|| Error::not_found("announcement", id))?;
    backend.delete_announcement(id)?;
    info!(id, "Deleted announcement");
    Ok(())
}
