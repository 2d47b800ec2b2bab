//! The table operations the workflows are written against.
//!
//! Every method is one independent call. Multi-step workflows sequence
//! these calls and compensate by hand; there is no transaction spanning
//! two calls.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    Announcement, CondolenceMessage, EnshrinedRecord, FuneralRecord, NewCondolence,
};
use crate::rooms::RoomNumber;

use super::Storage;

/// CRUD calls against the four funeral tables.
pub trait FuneralBackend {
    /// Active funerals of a home, in room order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn active_funerals(&self, home: &str) -> Result<Vec<FuneralRecord>>;

    /// The active funeral in a room, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn active_in_room(&self, home: &str, room: RoomNumber) -> Result<Option<FuneralRecord>>;

    /// A funeral by id, regardless of home.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn funeral(&self, id: &str) -> Result<Option<FuneralRecord>>;

    /// Insert a funeral, assigning its id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RoomOccupied`] when the room already has an active
    /// funeral, or a query error.
    fn insert_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord>;

    /// Overwrite a stored funeral by id, refreshing `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no row has the id.
    fn update_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord>;

    /// Move a funeral to another room.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and
    /// [`Error::RoomOccupied`] when the target is taken.
    fn set_funeral_room(&self, id: &str, room: RoomNumber) -> Result<()>;

    /// Delete a funeral. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn delete_funeral(&self, id: &str) -> Result<bool>;

    /// Archive a snapshot of a funeral.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_announcement(
        &self,
        record: &FuneralRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<Announcement>;

    /// Archived funerals of a home, newest archive first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn announcements(&self, home: &str) -> Result<Vec<Announcement>>;

    /// An announcement by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn announcement(&self, id: &str) -> Result<Option<Announcement>>;

    /// Delete an announcement. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn delete_announcement(&self, id: &str) -> Result<bool>;

    /// Condolence messages of a room, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn condolences(&self, home: &str, room: RoomNumber) -> Result<Vec<CondolenceMessage>>;

    /// Store a condolence message.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_condolence(&self, message: &NewCondolence) -> Result<CondolenceMessage>;

    /// Delete every condolence of a room. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn delete_condolences(&self, home: &str, room: RoomNumber) -> Result<usize>;

    /// The enshrined queue of a home, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn enshrined(&self, home: &str) -> Result<Vec<EnshrinedRecord>>;

    /// One enshrined record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn enshrined_record(&self, id: &str) -> Result<Option<EnshrinedRecord>>;

    /// Insert an enshrined record as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert_enshrined(&self, record: &EnshrinedRecord) -> Result<()>;

    /// Overwrite an enshrined record by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no row has the id.
    fn update_enshrined(&self, record: &EnshrinedRecord) -> Result<()>;

    /// Delete an enshrined record. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn delete_enshrined(&self, id: &str) -> Result<bool>;
}

/// A [`Storage`] shared between request handlers and background tasks.
///
/// The connection is locked for the length of one call, so consecutive
/// workflow steps from different sessions may interleave.
#[derive(Debug, Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<Storage>>,
}

impl SharedStorage {
    /// Wrap a storage handle.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Storage>> {
        self.inner
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))
    }
}

impl FuneralBackend for SharedStorage {
    fn active_funerals(&self, home: &str) -> Result<Vec<FuneralRecord>> {
        self.lock()?.active_funerals(home)
    }

    fn active_in_room(&self, home: &str, room: RoomNumber) -> Result<Option<FuneralRecord>> {
        self.lock()?.active_in_room(home, room)
    }

    fn funeral(&self, id: &str) -> Result<Option<FuneralRecord>> {
        self.lock()?.funeral(id)
    }

    fn insert_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord> {
        self.lock()?.insert_funeral(record)
    }

    fn update_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord> {
        self.lock()?.update_funeral(record)
    }

    fn set_funeral_room(&self, id: &str, room: RoomNumber) -> Result<()> {
        self.lock()?.set_funeral_room(id, room)
    }

    fn delete_funeral(&self, id: &str) -> Result<bool> {
        self.lock()?.delete_funeral(id)
    }

    fn insert_announcement(
        &self,
        record: &FuneralRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<Announcement> {
        self.lock()?.insert_announcement(record, archived_at)
    }

    fn announcements(&self, home: &str) -> Result<Vec<Announcement>> {
        self.lock()?.announcements(home)
    }

    fn announcement(&self, id: &str) -> Result<Option<Announcement>> {
        self.lock()?.announcement(id)
    }

    fn delete_announcement(&self, id: &str) -> Result<bool> {
        self.lock()?.delete_announcement(id)
    }

    fn condolences(&self, home: &str, room: RoomNumber) -> Result<Vec<CondolenceMessage>> {
        self.lock()?.condolences(home, room)
    }

    fn insert_condolence(&self, message: &NewCondolence) -> Result<CondolenceMessage> {
        self.lock()?.insert_condolence(message)
    }

    fn delete_condolences(&self, home: &str, room: RoomNumber) -> Result<usize> {
        self.lock()?.delete_condolences(home, room)
    }

    fn enshrined(&self, home: &str) -> Result<Vec<EnshrinedRecord>> {
        self.lock()?.enshrined(home)
    }

    fn enshrined_record(&self, id: &str) -> Result<Option<EnshrinedRecord>> {
        self.lock()?.enshrined_record(id)
    }

    fn insert_enshrined(&self, record: &EnshrinedRecord) -> Result<()> {
        self.lock()?.insert_enshrined(record)
    }

    fn update_enshrined(&self, record: &EnshrinedRecord) -> Result<()> {
        self.lock()?.update_enshrined(record)
    }

    fn delete_enshrined(&self, id: &str) -> Result<bool> {
        self.lock()?.delete_enshrined(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_storage_delegates() {
        let shared = SharedStorage::new(Storage::open_in_memory().unwrap());
        let room = RoomNumber::new(2).unwrap();
        let saved = shared
            .insert_funeral(&FuneralRecord::new("home-1", room, "홍길동"))
            .unwrap();

        let clone = shared.clone();
        let found = clone.active_in_room("home-1", room).unwrap().unwrap();
        assert_eq!(found.id, saved.id);
    }
}
