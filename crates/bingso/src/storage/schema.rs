//! `SQLite` schema definitions for bingso.
//!
//! Active funerals and their archived announcements share one column set;
//! the announcement table adds the source funeral id and archive time.

/// Columns shared by `funerals` and `funeral_announcements`, apart from `id`.
macro_rules! record_columns {
    () => {
        r"
    funeral_home_id TEXT NOT NULL,
    room_number INTEGER NOT NULL,
    floor TEXT NOT NULL DEFAULT '',
    deceased_name TEXT NOT NULL,
    deceased_hanja TEXT NOT NULL DEFAULT '',
    age INTEGER,
    gender TEXT NOT NULL DEFAULT '',
    religion TEXT NOT NULL DEFAULT '',
    religion_title TEXT NOT NULL DEFAULT '',
    baptismal_name TEXT NOT NULL DEFAULT '',
    other_title TEXT NOT NULL DEFAULT '',
    placement_time TEXT,
    placement_date TEXT,
    shroud_time TEXT,
    casket_time TEXT,
    funeral_time TEXT,
    checkout_time TEXT,
    death_time TEXT,
    burial_type TEXT,
    burial_location TEXT NOT NULL DEFAULT '',
    burial_location_2 TEXT NOT NULL DEFAULT '',
    death_cause TEXT NOT NULL DEFAULT '',
    death_place TEXT NOT NULL DEFAULT '',
    chemical_treatment TEXT NOT NULL DEFAULT '',
    deceased_address TEXT NOT NULL DEFAULT '',
    deceased_note TEXT NOT NULL DEFAULT '',
    resident_number TEXT NOT NULL DEFAULT '',
    business_note TEXT NOT NULL DEFAULT '',
    funeral_director TEXT NOT NULL DEFAULT '',
    funeral_company TEXT NOT NULL DEFAULT '',
    chief_message TEXT NOT NULL DEFAULT '',
    photo_url TEXT,
    use_photo_in_obituary INTEGER NOT NULL DEFAULT 1,
    bank_accounts TEXT NOT NULL DEFAULT '[]',
    family_members TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL"
    };
}

/// SQL statement to create the active funerals table.
pub const CREATE_FUNERALS_TABLE: &str = concat!(
    "CREATE TABLE IF NOT EXISTS funerals (\n    id TEXT PRIMARY KEY,",
    record_columns!(),
    "\n)"
);

/// At most one active funeral per room of a home.
pub const CREATE_ACTIVE_ROOM_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_funerals_active_room
ON funerals(funeral_home_id, room_number) WHERE status = 'active'
";

/// SQL statement to create the announcements (archive) table.
pub const CREATE_ANNOUNCEMENTS_TABLE: &str = concat!(
    "CREATE TABLE IF NOT EXISTS funeral_announcements (\n    id TEXT PRIMARY KEY,\n    funeral_id TEXT,\n    archived_at TEXT NOT NULL,",
    record_columns!(),
    "\n)"
);

/// SQL statement to create an index on announcement owner.
pub const CREATE_ANNOUNCEMENTS_HOME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_announcements_home ON funeral_announcements(funeral_home_id)
";

/// SQL statement to create the condolence messages table.
///
/// Messages are keyed by room number, not funeral id.
pub const CREATE_CONDOLENCES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS condolence_messages (
    id TEXT PRIMARY KEY,
    funeral_home_id TEXT NOT NULL,
    room_number INTEGER NOT NULL,
    sender_name TEXT NOT NULL,
    sender_relation TEXT NOT NULL DEFAULT '',
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to index condolences by room.
pub const CREATE_CONDOLENCES_ROOM_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_condolences_room
ON condolence_messages(funeral_home_id, room_number, created_at DESC)
";

/// SQL statement to create the enshrined (temporary holding) table.
pub const CREATE_ENSHRINED_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS enshrined (
    id TEXT PRIMARY KEY,
    funeral_home_id TEXT NOT NULL,
    deceased_name TEXT NOT NULL,
    enshrinement_time TEXT,
    contact_name TEXT NOT NULL DEFAULT '',
    contact_phone TEXT NOT NULL DEFAULT '',
    contact_relation TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'waiting',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to index the enshrined queue by home.
pub const CREATE_ENSHRINED_HOME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_enshrined_home ON enshrined(funeral_home_id, created_at)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FUNERALS_TABLE,
    CREATE_ACTIVE_ROOM_INDEX,
    CREATE_ANNOUNCEMENTS_TABLE,
    CREATE_ANNOUNCEMENTS_HOME_INDEX,
    CREATE_CONDOLENCES_TABLE,
    CREATE_CONDOLENCES_ROOM_INDEX,
    CREATE_ENSHRINED_TABLE,
    CREATE_ENSHRINED_HOME_INDEX,
    CREATE_METADATA_TABLE,
];

/// Record columns written on insert and update, in table order.
pub const RECORD_COLUMNS: &[&str] = &[
    "funeral_home_id",
    "room_number",
    "floor",
    "deceased_name",
    "deceased_hanja",
    "age",
    "gender",
    "religion",
    "religion_title",
    "baptismal_name",
    "other_title",
    "placement_time",
    "placement_date",
    "shroud_time",
    "casket_time",
    "funeral_time",
    "checkout_time",
    "death_time",
    "burial_type",
    "burial_location",
    "burial_location_2",
    "death_cause",
    "death_place",
    "chemical_treatment",
    "deceased_address",
    "deceased_note",
    "resident_number",
    "business_note",
    "funeral_director",
    "funeral_company",
    "chief_message",
    "photo_url",
    "use_photo_in_obituary",
    "bank_accounts",
    "family_members",
    "status",
    "created_at",
    "updated_at",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_record_tables_share_columns() {
        for column in RECORD_COLUMNS {
            let decl = format!("\n    {column} ");
            assert!(CREATE_FUNERALS_TABLE.contains(&decl), "funerals lacks {column}");
            assert!(
                CREATE_ANNOUNCEMENTS_TABLE.contains(&decl),
                "announcements lacks {column}"
            );
        }
        assert!(CREATE_ANNOUNCEMENTS_TABLE.contains("funeral_id TEXT"));
        assert!(CREATE_ANNOUNCEMENTS_TABLE.contains("archived_at TEXT NOT NULL"));
    }

    #[test]
    fn test_active_room_index_is_partial_unique() {
        assert!(CREATE_ACTIVE_ROOM_INDEX.contains("UNIQUE"));
        assert!(CREATE_ACTIVE_ROOM_INDEX.contains("WHERE status = 'active'"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
