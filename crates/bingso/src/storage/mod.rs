//! Storage layer for bingso.
//!
//! This module provides `SQLite`-based persistent storage for funeral
//! records, their announcements, condolence messages and the enshrined
//! queue.

mod backend;
pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    wall_clock, Announcement, BurialType, CondolenceMessage, EnshrinedRecord, FuneralRecord,
    FuneralStatus, NewCondolence,
};
use crate::rooms::RoomNumber;

pub use backend::{FuneralBackend, SharedStorage};
use schema::RECORD_COLUMNS;

/// Storage engine backed by a single `SQLite` connection.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time at the precision stored in the database.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width UTC timestamp so text ordering matches time ordering.
fn stamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn conversion_error(row: &Row<'_>, column: &str, message: String) -> rusqlite::Error {
    let index = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn get_room(row: &Row<'_>, column: &str) -> rusqlite::Result<RoomNumber> {
    let value: u8 = row.get(column)?;
    RoomNumber::new(value).map_err(|e| conversion_error(row, column, e.to_string()))
}

fn get_clock(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<chrono::NaiveDateTime>> {
    let value: Option<String> = row.get(column)?;
    Ok(value.as_deref().and_then(wall_clock::parse))
}

fn get_stamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(column)?;
    parse_stamp(&value).ok_or_else(|| conversion_error(row, column, format!("bad timestamp {value}")))
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let value: String = row.get(column)?;
    serde_json::from_str(&value).map_err(|e| conversion_error(row, column, e.to_string()))
}

/// Map a unique-index violation on the active-room index to `RoomOccupied`.
fn occupied_or(err: rusqlite::Error, room: RoomNumber) -> Error {
    if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
        Error::RoomOccupied { room }
    } else {
        Error::DatabaseQuery(err)
    }
}

/// Owned column values of a record, ready to bind by name.
struct RecordValues(Vec<(&'static str, Box<dyn ToSql>)>);

impl RecordValues {
    fn from_record(record: &FuneralRecord) -> Result<Self> {
        let clock = |v: Option<chrono::NaiveDateTime>| v.as_ref().map(wall_clock::render);
        let created_at = record.created_at.unwrap_or_else(now);
        let updated_at = record.updated_at.unwrap_or(created_at);

        let values: Vec<(&'static str, Box<dyn ToSql>)> = vec![
            ("funeral_home_id", Box::new(record.funeral_home_id.clone())),
            ("room_number", Box::new(record.room_number.get())),
            ("floor", Box::new(record.floor.clone())),
            ("deceased_name", Box::new(record.deceased_name.clone())),
            ("deceased_hanja", Box::new(record.deceased_hanja.clone())),
            ("age", Box::new(record.age)),
            ("gender", Box::new(record.gender.clone())),
            ("religion", Box::new(record.religion.clone())),
            ("religion_title", Box::new(record.religion_title.clone())),
            ("baptismal_name", Box::new(record.baptismal_name.clone())),
            ("other_title", Box::new(record.other_title.clone())),
            ("placement_time", Box::new(clock(record.placement_time))),
            ("placement_date", Box::new(clock(record.placement_date))),
            ("shroud_time", Box::new(clock(record.shroud_time))),
            ("casket_time", Box::new(clock(record.casket_time))),
            ("funeral_time", Box::new(clock(record.funeral_time))),
            ("checkout_time", Box::new(clock(record.checkout_time))),
            ("death_time", Box::new(clock(record.death_time))),
            ("burial_type", Box::new(record.burial_type.map(BurialType::as_str))),
            ("burial_location", Box::new(record.burial_location.clone())),
            ("burial_location_2", Box::new(record.burial_location_2.clone())),
            ("death_cause", Box::new(record.death_cause.clone())),
            ("death_place", Box::new(record.death_place.clone())),
            ("chemical_treatment", Box::new(record.chemical_treatment.clone())),
            ("deceased_address", Box::new(record.deceased_address.clone())),
            ("deceased_note", Box::new(record.deceased_note.clone())),
            ("resident_number", Box::new(record.resident_number.clone())),
            ("business_note", Box::new(record.business_note.clone())),
            ("funeral_director", Box::new(record.funeral_director.clone())),
            ("funeral_company", Box::new(record.funeral_company.clone())),
            ("chief_message", Box::new(record.chief_message.clone())),
            ("photo_url", Box::new(record.photo_url.clone())),
            ("use_photo_in_obituary", Box::new(record.use_photo_in_obituary)),
            ("bank_accounts", Box::new(serde_json::to_string(&record.bank_accounts)?)),
            ("family_members", Box::new(serde_json::to_string(&record.family_members)?)),
            ("status", Box::new(record.status.to_string())),
            ("created_at", Box::new(stamp(created_at))),
            ("updated_at", Box::new(stamp(updated_at))),
        ];
        debug_assert_eq!(values.len(), RECORD_COLUMNS.len());
        Ok(Self(values))
    }

    fn push(&mut self, column: &'static str, value: impl ToSql + 'static) {
        self.0.push((column, Box::new(value)));
    }

    fn named(&self) -> Vec<(String, &dyn ToSql)> {
        self.0
            .iter()
            .map(|(column, value)| (format!(":{column}"), value.as_ref()))
            .collect()
    }

    fn execute(&self, conn: &Connection, sql: &str) -> Result<usize> {
        let named = self.named();
        let params: Vec<(&str, &dyn ToSql)> =
            named.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        Ok(conn.execute(sql, params.as_slice())?)
    }
}

fn insert_sql(table: &str, extra: &[&str]) -> String {
    let columns: Vec<&str> = extra.iter().chain(RECORD_COLUMNS).copied().collect();
    let placeholders: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn update_sql() -> String {
    let assignments: Vec<String> = RECORD_COLUMNS
        .iter()
        .filter(|c| **c != "created_at")
        .map(|c| format!("{c} = :{c}"))
        .collect();
    format!("UPDATE funerals SET {} WHERE id = :id", assignments.join(", "))
}

const CONDOLENCE_COLUMNS: &str =
    "id, funeral_home_id, room_number, sender_name, sender_relation, message, created_at";

const ENSHRINED_COLUMNS: &str = "id, funeral_home_id, deceased_name, enshrinement_time, \
     contact_name, contact_phone, contact_relation, notes, status, created_at, updated_at";

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FuneralRecord> {
        let status: String = row.get("status")?;
        let status = status
            .parse::<FuneralStatus>()
            .map_err(|e| conversion_error(row, "status", e.to_string()))?;
        let burial_type: Option<String> = row.get("burial_type")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(FuneralRecord {
            id: Some(row.get("id")?),
            funeral_home_id: row.get("funeral_home_id")?,
            room_number: get_room(row, "room_number")?,
            floor: row.get("floor")?,
            deceased_name: row.get("deceased_name")?,
            deceased_hanja: row.get("deceased_hanja")?,
            age: row.get("age")?,
            gender: row.get("gender")?,
            religion: row.get("religion")?,
            religion_title: row.get("religion_title")?,
            baptismal_name: row.get("baptismal_name")?,
            other_title: row.get("other_title")?,
            placement_time: get_clock(row, "placement_time")?,
            placement_date: get_clock(row, "placement_date")?,
            shroud_time: get_clock(row, "shroud_time")?,
            casket_time: get_clock(row, "casket_time")?,
            funeral_time: get_clock(row, "funeral_time")?,
            checkout_time: get_clock(row, "checkout_time")?,
            death_time: get_clock(row, "death_time")?,
            burial_type: burial_type.as_deref().and_then(BurialType::parse),
            burial_location: row.get("burial_location")?,
            burial_location_2: row.get("burial_location_2")?,
            death_cause: row.get("death_cause")?,
            death_place: row.get("death_place")?,
            chemical_treatment: row.get("chemical_treatment")?,
            deceased_address: row.get("deceased_address")?,
            deceased_note: row.get("deceased_note")?,
            resident_number: row.get("resident_number")?,
            business_note: row.get("business_note")?,
            funeral_director: row.get("funeral_director")?,
            funeral_company: row.get("funeral_company")?,
            chief_message: row.get("chief_message")?,
            photo_url: row.get("photo_url")?,
            use_photo_in_obituary: row.get("use_photo_in_obituary")?,
            bank_accounts: get_json(row, "bank_accounts")?,
            family_members: get_json(row, "family_members")?,
            status,
            created_at: parse_stamp(&created_at),
            updated_at: parse_stamp(&updated_at),
        })
    }

    fn row_to_announcement(row: &Row<'_>) -> rusqlite::Result<Announcement> {
        Ok(Announcement {
            id: row.get("id")?,
            funeral_id: row.get("funeral_id")?,
            archived_at: get_stamp(row, "archived_at")?,
            record: Self::row_to_record(row)?,
        })
    }

    fn row_to_condolence(row: &Row<'_>) -> rusqlite::Result<CondolenceMessage> {
        Ok(CondolenceMessage {
            id: row.get("id")?,
            funeral_home_id: row.get("funeral_home_id")?,
            room_number: get_room(row, "room_number")?,
            sender_name: row.get("sender_name")?,
            sender_relation: row.get("sender_relation")?,
            message: row.get("message")?,
            created_at: get_stamp(row, "created_at")?,
        })
    }

    fn row_to_enshrined(row: &Row<'_>) -> rusqlite::Result<EnshrinedRecord> {
        let status: String = row.get("status")?;
        Ok(EnshrinedRecord {
            id: row.get("id")?,
            funeral_home_id: row.get("funeral_home_id")?,
            deceased_name: row.get("deceased_name")?,
            enshrinement_time: get_clock(row, "enshrinement_time")?,
            contact_name: row.get("contact_name")?,
            contact_phone: row.get("contact_phone")?,
            contact_relation: row.get("contact_relation")?,
            notes: row.get("notes")?,
            status: status
                .parse()
                .map_err(|e: Error| conversion_error(row, "status", e.to_string()))?,
            created_at: get_stamp(row, "created_at")?,
            updated_at: get_stamp(row, "updated_at")?,
        })
    }
}

impl FuneralBackend for Storage {
    fn active_funerals(&self, home: &str) -> Result<Vec<FuneralRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM funerals WHERE funeral_home_id = ?1 AND status = 'active' ORDER BY room_number",
        )?;
        let records = stmt
            .query_map([home], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn active_in_room(&self, home: &str, room: RoomNumber) -> Result<Option<FuneralRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT * FROM funerals WHERE funeral_home_id = ?1 AND room_number = ?2 AND status = 'active'",
                params![home, room.get()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn funeral(&self, id: &str) -> Result<Option<FuneralRecord>> {
        let record = self
            .conn
            .query_row("SELECT * FROM funerals WHERE id = ?1", [id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    fn insert_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord> {
        let time = now();
        let mut stored = record.clone();
        stored.id = Some(new_id());
        stored.created_at = Some(record.created_at.map_or(time, |t| t.trunc_subsecs(6)));
        stored.updated_at = Some(time);

        let mut values = RecordValues::from_record(&stored)?;
        values.push("id", stored.id.clone());
        values
            .execute(&self.conn, &insert_sql("funerals", &["id"]))
            .map_err(|e| match e {
                Error::DatabaseQuery(err) => occupied_or(err, stored.room_number),
                other => other,
            })?;

        debug!(id = ?stored.id, room = %stored.room_number, "Inserted funeral");
        Ok(stored)
    }

    fn update_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord> {
        let id = record
            .id
            .clone()
            .ok_or_else(|| Error::validation("cannot update a funeral without an id"))?;
        let mut stored = record.clone();
        stored.updated_at = Some(now());

        let mut values = RecordValues::from_record(&stored)?;
        values.0.retain(|(column, _)| *column != "created_at");
        values.push("id", id.clone());
        let changed = values
            .execute(&self.conn, &update_sql())
            .map_err(|e| match e {
                Error::DatabaseQuery(err) => occupied_or(err, stored.room_number),
                other => other,
            })?;
        if changed == 0 {
            return Err(Error::not_found("funeral", id));
        }
        Ok(stored)
    }

    fn set_funeral_room(&self, id: &str, room: RoomNumber) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE funerals SET room_number = ?1, floor = ?2, updated_at = ?3 WHERE id = ?4",
                params![room.get(), room.info().floor, stamp(now()), id],
            )
            .map_err(|err| occupied_or(err, room))?;
        if changed == 0 {
            return Err(Error::not_found("funeral", id));
        }
        Ok(())
    }

    fn delete_funeral(&self, id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM funerals WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn insert_announcement(
        &self,
        record: &FuneralRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<Announcement> {
        let mut snapshot = record.clone();
        snapshot.status = FuneralStatus::Completed;
        let archived_at = archived_at.trunc_subsecs(6);
        let id = new_id();

        let mut values = RecordValues::from_record(&snapshot)?;
        values.push("id", id.clone());
        values.push("funeral_id", record.id.clone());
        values.push("archived_at", stamp(archived_at));
        values.execute(
            &self.conn,
            &insert_sql("funeral_announcements", &["id", "funeral_id", "archived_at"]),
        )?;

        debug!(%id, funeral_id = ?record.id, "Inserted announcement");
        Ok(Announcement {
            id,
            funeral_id: record.id.clone(),
            archived_at,
            record: snapshot,
        })
    }

    fn announcements(&self, home: &str) -> Result<Vec<Announcement>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM funeral_announcements WHERE funeral_home_id = ?1 ORDER BY archived_at DESC",
        )?;
        let list = stmt
            .query_map([home], Self::row_to_announcement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(list)
    }

    fn announcement(&self, id: &str) -> Result<Option<Announcement>> {
        let found = self
            .conn
            .query_row(
                "SELECT * FROM funeral_announcements WHERE id = ?1",
                [id],
                Self::row_to_announcement,
            )
            .optional()?;
        Ok(found)
    }

    fn delete_announcement(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM funeral_announcements WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn condolences(&self, home: &str, room: RoomNumber) -> Result<Vec<CondolenceMessage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONDOLENCE_COLUMNS} FROM condolence_messages \
             WHERE funeral_home_id = ?1 AND room_number = ?2 ORDER BY created_at DESC"
        ))?;
        let messages = stmt
            .query_map(params![home, room.get()], Self::row_to_condolence)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn insert_condolence(&self, message: &NewCondolence) -> Result<CondolenceMessage> {
        let stored = CondolenceMessage {
            id: new_id(),
            funeral_home_id: message.funeral_home_id.clone(),
            room_number: message.room_number,
            sender_name: message.sender_name.trim().to_string(),
            sender_relation: message.sender_relation.trim().to_string(),
            message: message.message.trim().to_string(),
            created_at: message.created_at.map_or_else(now, |t| t.trunc_subsecs(6)),
        };
        self.conn.execute(
            &format!("INSERT INTO condolence_messages ({CONDOLENCE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                stored.id,
                stored.funeral_home_id,
                stored.room_number.get(),
                stored.sender_name,
                stored.sender_relation,
                stored.message,
                stamp(stored.created_at),
            ],
        )?;
        Ok(stored)
    }

    fn delete_condolences(&self, home: &str, room: RoomNumber) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM condolence_messages WHERE funeral_home_id = ?1 AND room_number = ?2",
            params![home, room.get()],
        )?;
        Ok(deleted)
    }

    fn enshrined(&self, home: &str) -> Result<Vec<EnshrinedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENSHRINED_COLUMNS} FROM enshrined WHERE funeral_home_id = ?1 ORDER BY created_at"
        ))?;
        let list = stmt
            .query_map([home], Self::row_to_enshrined)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(list)
    }

    fn enshrined_record(&self, id: &str) -> Result<Option<EnshrinedRecord>> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {ENSHRINED_COLUMNS} FROM enshrined WHERE id = ?1"),
                [id],
                Self::row_to_enshrined,
            )
            .optional()?;
        Ok(found)
    }

    fn insert_enshrined(&self, record: &EnshrinedRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO enshrined ({ENSHRINED_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                record.id,
                record.funeral_home_id,
                record.deceased_name,
                record.enshrinement_time.as_ref().map(wall_clock::render),
                record.contact_name,
                record.contact_phone,
                record.contact_relation,
                record.notes,
                record.status.to_string(),
                stamp(record.created_at),
                stamp(record.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update_enshrined(&self, record: &EnshrinedRecord) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE enshrined SET deceased_name = ?1, enshrinement_time = ?2, contact_name = ?3, \
             contact_phone = ?4, contact_relation = ?5, notes = ?6, status = ?7, updated_at = ?8 \
             WHERE id = ?9",
            params![
                record.deceased_name,
                record.enshrinement_time.as_ref().map(wall_clock::render),
                record.contact_name,
                record.contact_phone,
                record.contact_relation,
                record.notes,
                record.status.to_string(),
                stamp(record.updated_at),
                record.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("enshrined record", record.id.clone()));
        }
        Ok(())
    }

    fn delete_enshrined(&self, id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM enshrined WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }
}
