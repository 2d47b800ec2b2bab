//! Command-line interface for bingso.
//!
//! This module provides the CLI structure for the `bingso` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BoardCommand, CheckoutCommand, ConfigCommand, EnshrinedCommand, HashPasswordCommand, HomeArg,
    RecordsCommand, RoomsCommand, ServeCommand, SortKeyArg, SortOrderArg, TransferCommand,
};

/// bingso - Funeral home administration
///
/// Runs the dashboard API, the public obituary and status board, and
/// offers record maintenance from the shell.
#[derive(Debug, Parser)]
#[command(name = "bingso")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// Print what the status board shows
    Board(BoardCommand),

    /// Show room occupancy
    Rooms(RoomsCommand),

    /// List active or completed funerals
    Records(RecordsCommand),

    /// Archive a funeral and free its room
    Checkout(CheckoutCommand),

    /// Move a funeral to another room
    Transfer(TransferCommand),

    /// Manage the enshrined queue
    #[command(subcommand)]
    Enshrined(EnshrinedCommand),

    /// Hash a home account password for the config file
    HashPassword(HashPasswordCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
