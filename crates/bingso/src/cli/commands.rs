//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::search::{SortKey, SortOrder};

/// Arguments of `serve`.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on, overriding `server.bind`
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Do not start the status board poller
    #[arg(long)]
    pub no_board: bool,
}

/// Home selection shared by the record commands.
#[derive(Debug, Clone, Args)]
pub struct HomeArg {
    /// Funeral home id; optional when exactly one home is configured
    #[arg(long = "home", value_name = "ID")]
    pub home: Option<String>,
}

/// Arguments of `board`.
#[derive(Debug, Args)]
pub struct BoardCommand {
    /// Funeral home selection
    #[command(flatten)]
    pub home: HomeArg,

    /// Show only this room (e.g. `room-3` or `3`)
    #[arg(short, long)]
    pub room: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments of `rooms`.
#[derive(Debug, Args)]
pub struct RoomsCommand {
    /// Funeral home selection
    #[command(flatten)]
    pub home: HomeArg,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments of `records`.
#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// Funeral home selection
    #[command(flatten)]
    pub home: HomeArg,

    /// Show active funerals instead of completed ones
    #[arg(short, long)]
    pub active: bool,

    /// Filter completed records by name, burial location or chief mourner
    #[arg(short, long)]
    pub search: Option<String>,

    /// Sort key for completed records
    #[arg(long, value_enum, default_value = "funeral-time")]
    pub sort_by: SortKeyArg,

    /// Sort direction
    #[arg(long, value_enum, default_value = "desc")]
    pub order: SortOrderArg,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments of `checkout`.
#[derive(Debug, Args)]
pub struct CheckoutCommand {
    /// Funeral home selection
    #[command(flatten)]
    pub home: HomeArg,

    /// Room to check out
    pub room: String,
}

/// Arguments of `transfer`.
#[derive(Debug, Args)]
pub struct TransferCommand {
    /// Funeral home selection
    #[command(flatten)]
    pub home: HomeArg,

    /// Current room
    pub from: String,

    /// Target room
    pub to: String,
}

/// Enshrined queue commands.
#[derive(Debug, Subcommand)]
pub enum EnshrinedCommand {
    /// List the queue
    List {
        /// Funeral home selection
        #[command(flatten)]
        home: HomeArg,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Register a body
    Add {
        /// Funeral home selection
        #[command(flatten)]
        home: HomeArg,

        /// Deceased name (defaults to 미상)
        #[arg(short, long)]
        name: Option<String>,

        /// Contact name
        #[arg(long)]
        contact: Option<String>,

        /// Contact phone
        #[arg(long)]
        phone: Option<String>,

        /// Contact relation
        #[arg(long)]
        relation: Option<String>,

        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Remove a record from the queue
    Remove {
        /// Funeral home selection
        #[command(flatten)]
        home: HomeArg,

        /// Record id
        id: String,
    },
}

/// Arguments of `hash-password`.
#[derive(Debug, Args)]
pub struct HashPasswordCommand {
    /// Password to hash; read from stdin when omitted
    pub password: Option<String>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Sort key argument for completed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKeyArg {
    /// Procession time
    FuneralTime,
    /// Check-in time
    PlacementTime,
    /// Deceased name
    Name,
    /// Age
    Age,
}

impl From<SortKeyArg> for SortKey {
    fn from(arg: SortKeyArg) -> Self {
        match arg {
            SortKeyArg::FuneralTime => Self::FuneralTime,
            SortKeyArg::PlacementTime => Self::PlacementTime,
            SortKeyArg::Name => Self::DeceasedName,
            SortKeyArg::Age => Self::Age,
        }
    }
}

/// Sort direction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrderArg {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl From<SortOrderArg> for SortOrder {
    fn from(arg: SortOrderArg) -> Self {
        match arg {
            SortOrderArg::Asc => Self::Asc,
            SortOrderArg::Desc => Self::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_arg_conversion() {
        assert_eq!(SortKey::from(SortKeyArg::FuneralTime), SortKey::FuneralTime);
        assert_eq!(SortKey::from(SortKeyArg::PlacementTime), SortKey::PlacementTime);
        assert_eq!(SortKey::from(SortKeyArg::Name), SortKey::DeceasedName);
        assert_eq!(SortKey::from(SortKeyArg::Age), SortKey::Age);
    }

    #[test]
    fn test_sort_order_arg_conversion() {
        assert_eq!(SortOrder::from(SortOrderArg::Asc), SortOrder::Asc);
        assert_eq!(SortOrder::from(SortOrderArg::Desc), SortOrder::Desc);
    }
}
