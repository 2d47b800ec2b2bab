//! `bingso` - Funeral home administration service
//!
//! This library provides room (빈소) management, funeral records and their
//! checkout/transfer workflows, the enshrined queue, a public obituary with
//! condolence messages, and a rotating status board.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod obituary;
pub mod photo;
pub mod rooms;
pub mod schedule;
pub mod search;
pub mod server;
pub mod storage;
pub mod workflow;

pub use config::{hash_password, Config};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Announcement, FuneralRecord, FuneralStatus};
pub use rooms::RoomNumber;
pub use storage::{FuneralBackend, SharedStorage, Storage};
