//! Error types for bingso.
//!
//! This module defines all error types used throughout the bingso crate,
//! providing detailed context for debugging and user-facing messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::rooms::RoomNumber;

/// The main error type for bingso operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Errors ===
    /// Input failed validation before any write was attempted.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A room number outside the fixed catalog.
    #[error("unknown room: {0}")]
    UnknownRoom(String),

    /// The target room already hosts an active funeral.
    #[error("room {room} is already occupied")]
    RoomOccupied {
        /// The occupied room.
        room: RoomNumber,
    },

    /// No active funeral exists in the room.
    #[error("no active funeral in room {room}")]
    RoomVacant {
        /// The vacant room.
        room: RoomNumber,
    },

    /// A record addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// Checkout failed after the announcement was written, and the
    /// announcement was deleted again.
    #[error("checkout failed and was rolled back: {reason}")]
    CheckoutRolledBack {
        /// Why the checkout failed.
        reason: String,
    },

    /// Checkout failed and the compensating delete failed too; the
    /// announcement may now duplicate the active record.
    #[error("checkout failed and rollback of announcement {announcement_id} failed: {reason}; data may be inconsistent")]
    CheckoutInconsistent {
        /// The announcement that could not be removed.
        announcement_id: String,
        /// Why the checkout failed.
        reason: String,
        /// Why the compensating delete failed.
        rollback_error: String,
    },

    /// An uploaded photo was rejected.
    #[error("photo rejected: {0}")]
    PhotoRejected(String),

    // === Auth Errors ===
    /// Login failed or the session is missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for bingso operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error for the given entity kind.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Check if this error means the addressed record or room was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::RoomVacant { .. })
    }

    /// Check if this error was caused by the caller's input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::UnknownRoom(_) | Self::PhotoRejected(_)
        )
    }
}
