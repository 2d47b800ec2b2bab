//! `bingso` - CLI for the funeral home service
//!
//! This binary runs the HTTP server and offers record maintenance from the
//! shell against the same database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::BufRead;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use bingso::board::{load_slides, spawn_poller, BoardHub, Slide, EMPTY_MESSAGE};
use bingso::cli::{
    BoardCommand, CheckoutCommand, Cli, Command, ConfigCommand, EnshrinedCommand, HomeArg,
    RecordsCommand, TransferCommand,
};
use bingso::model::NewEnshrined;
use bingso::rooms::{overview, Occupancy, RoomNumber};
use bingso::search::CompletedQuery;
use bingso::server::{create_app, run_server, AppState};
use bingso::storage::{FuneralBackend, SharedStorage};
use bingso::{format, hash_password, init_logging, workflow, Config, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config` and `hash-password` work without a valid configuration
    match cli.command {
        Command::HashPassword(cmd) => handle_hash_password(cmd.password),
        Command::Config(cmd) => handle_config(cli.config, cmd),
        command => run(Config::load_from(cli.config)?, command).await,
    }
}

async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve(serve) => {
            let mut config = config;
            if let Some(bind) = serve.bind {
                config.server.bind = bind;
            }
            handle_serve(config, !serve.no_board).await
        }
        Command::Board(cmd) => handle_board(&config, &cmd),
        Command::Rooms(cmd) => handle_rooms(&config, &cmd.home, cmd.json),
        Command::Records(cmd) => handle_records(&config, cmd),
        Command::Checkout(cmd) => handle_checkout(&config, &cmd),
        Command::Transfer(cmd) => handle_transfer(&config, &cmd),
        Command::Enshrined(cmd) => handle_enshrined(&config, cmd),
        Command::HashPassword(_) | Command::Config(_) => Ok(()),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening {}", path.display()))
}

fn home_id(config: &Config, home: &HomeArg) -> anyhow::Result<String> {
    Ok(config.auth.resolve_home(home.home.as_deref())?.id.clone())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_serve(config: Config, with_board: bool) -> anyhow::Result<()> {
    if config.auth.homes.is_empty() {
        tracing::warn!("No funeral homes configured; nobody can sign in");
    }
    let storage = SharedStorage::new(open_storage(&config)?);
    let hub = BoardHub::new();

    if with_board {
        let homes = config.auth.homes.iter().map(|h| h.id.clone()).collect();
        let _poller = spawn_poller(
            storage.clone(),
            hub.clone(),
            homes,
            config.refresh_interval(),
            config.rotate_interval(),
        );
        info!(
            refresh = ?config.refresh_interval(),
            rotate = ?config.rotate_interval(),
            "Status board poller started"
        );
    }

    let addr = config.server.bind;
    let app = create_app(AppState::new(storage, config, hub));
    run_server(app, addr).await
}

fn print_slide(slide: &Slide) {
    println!(
        "{} ({})  故 {} {}",
        slide.room_name, slide.floor, slide.deceased_name, slide.religion_symbol
    );
    let family: Vec<String> = slide
        .family_members
        .iter()
        .map(|m| format!("{} {}", m.relation, m.name))
        .collect();
    if !family.is_empty() {
        println!("  유가족: {}", family.join(", "));
    }
    println!("  입관: {}", slide.casket_label);
    println!("  발인: {}", slide.funeral_label);
    if !slide.burial_location.is_empty() || !slide.burial_type.is_empty() {
        println!("  장지: {} {}", slide.burial_type, slide.burial_location);
    }
    if let Some(message) = &slide.latest_message {
        println!("  조문: {} - {}", message.sender_name, message.message);
    }
}

fn handle_board(config: &Config, cmd: &BoardCommand) -> anyhow::Result<()> {
    let home = home_id(config, &cmd.home)?;
    let pinned = cmd
        .room
        .as_deref()
        .map(RoomNumber::parse_label)
        .transpose()?;
    let storage = open_storage(config)?;
    let slides = load_slides(&storage, &home, pinned)?;

    if cmd.json {
        return print_json(&slides);
    }
    println!("{}", config.board.facility_name);
    println!();
    if slides.is_empty() {
        println!("{EMPTY_MESSAGE}");
    }
    for slide in &slides {
        print_slide(slide);
        println!();
    }
    Ok(())
}

fn handle_rooms(config: &Config, home: &HomeArg, json: bool) -> anyhow::Result<()> {
    let home = home_id(config, home)?;
    let storage = open_storage(config)?;
    let rooms = overview(&storage.active_funerals(&home)?);

    if json {
        return print_json(&rooms);
    }
    for room in &rooms {
        let status = match room.status {
            Occupancy::Available => "비어있음",
            Occupancy::Occupied => "사용중",
        };
        println!(
            "{:<12} {:<4} {:<8} {}",
            room.info.name,
            room.info.floor,
            status,
            room.deceased_name.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

fn handle_records(config: &Config, cmd: RecordsCommand) -> anyhow::Result<()> {
    let home = home_id(config, &cmd.home)?;
    let storage = open_storage(config)?;

    if cmd.active {
        let records = storage.active_funerals(&home)?;
        if cmd.json {
            return print_json(&records);
        }
        for record in &records {
            println!(
                "{:<12} {:<10} 발인 {}",
                record.room_number.info().name,
                record.deceased_name,
                format::schedule_label(record.funeral_time.as_ref())
            );
        }
        return Ok(());
    }

    let query = CompletedQuery {
        search: cmd.search.unwrap_or_default(),
        sort_by: cmd.sort_by.into(),
        order: cmd.order.into(),
    };
    let announcements = query.apply(storage.announcements(&home)?);
    if cmd.json {
        return print_json(&announcements);
    }
    for announcement in &announcements {
        let record = &announcement.record;
        println!(
            "{:<10} {:<10} {:<12} 발인 {}  {}",
            announcement.id.chars().take(8).collect::<String>(),
            record.deceased_name,
            record.room_number.info().name,
            format::schedule_label(record.funeral_time.as_ref()),
            record
                .chief_mourner()
                .map(|m| format!("상주 {}", m.name))
                .unwrap_or_default()
        );
    }
    println!();
    println!("{} record(s)", announcements.len());
    Ok(())
}

fn handle_checkout(config: &Config, cmd: &CheckoutCommand) -> anyhow::Result<()> {
    let home = home_id(config, &cmd.home)?;
    let room = RoomNumber::parse_label(&cmd.room)?;
    let storage = open_storage(config)?;

    let report = workflow::checkout(&storage, &home, room)?;
    println!(
        "Checked out {} from {} (announcement {})",
        report.announcement.record.deceased_name,
        room.info().name,
        report.announcement.id
    );
    println!("Condolence messages removed: {}", report.condolences_removed);
    for warning in &report.warnings {
        println!("Warning: {warning}");
    }
    Ok(())
}

fn handle_transfer(config: &Config, cmd: &TransferCommand) -> anyhow::Result<()> {
    let home = home_id(config, &cmd.home)?;
    let from = RoomNumber::parse_label(&cmd.from)?;
    let to = RoomNumber::parse_label(&cmd.to)?;
    let storage = open_storage(config)?;

    let report = workflow::transfer_room(&storage, &home, from, to)?;
    println!(
        "Moved funeral {} from {} to {}",
        report.funeral_id,
        from.info().name,
        to.info().name
    );
    println!("Condolence messages moved: {}", report.messages_moved);
    if report.messages_lost > 0 {
        println!("Condolence messages lost: {}", report.messages_lost);
    }
    Ok(())
}

fn handle_enshrined(config: &Config, cmd: EnshrinedCommand) -> anyhow::Result<()> {
    match cmd {
        EnshrinedCommand::List { home, json } => {
            let home = home_id(config, &home)?;
            let records = open_storage(config)?.enshrined(&home)?;
            if json {
                return print_json(&records);
            }
            for record in &records {
                println!(
                    "{}  {:<8} {:<14} {:<8} {} {}",
                    record.id,
                    record.deceased_name,
                    format::datetime_local(record.enshrinement_time.as_ref()),
                    record.status,
                    record.contact_name,
                    record.contact_phone
                );
            }
        }
        EnshrinedCommand::Add {
            home,
            name,
            contact,
            phone,
            relation,
            notes,
        } => {
            let home = home_id(config, &home)?;
            let intake = NewEnshrined {
                deceased_name: name.unwrap_or_default(),
                enshrinement_time: None,
                contact_name: contact.unwrap_or_default(),
                contact_phone: phone.unwrap_or_default(),
                contact_relation: relation.unwrap_or_default(),
                notes: notes.unwrap_or_default(),
            };
            let record = workflow::register_enshrined(&open_storage(config)?, &home, intake)?;
            println!("Registered {} as {}", record.deceased_name, record.id);
        }
        EnshrinedCommand::Remove { home, id } => {
            let home = home_id(config, &home)?;
            workflow::remove_enshrined(&open_storage(config)?, &home, &id)?;
            println!("Removed {id}");
        }
    }
    Ok(())
}

fn handle_hash_password(password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    anyhow::ensure!(!password.is_empty(), "password must not be empty");
    println!("{}", hash_password(&password)?);
    Ok(())
}

fn handle_config(
    path: Option<std::path::PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if json {
                return print_json(&config);
            }
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[Server]");
            println!("  Bind:               {}", config.server.bind);
            println!("  CORS origins:       {}", config.server.cors_origins.len());
            println!();
            println!("[Storage]");
            println!("  Database path:      {}", config.database_path().display());
            println!();
            println!("[Auth]");
            for home in &config.auth.homes {
                println!("  Home:               {} ({})", home.id, home.name);
            }
            println!(
                "  Session secret:     {}",
                if config.auth.session_secret.is_some() { "set" } else { "random per start" }
            );
            println!();
            println!("[Board]");
            println!("  Refresh (s):        {}", config.board.refresh_secs);
            println!("  Rotate (s):         {}", config.board.rotate_secs);
            println!("  Facility:           {}", config.board.facility_name);
            println!();
            println!("[Obituary]");
            println!("  Venue:              {}", config.obituary.venue_name);
            println!("  Address:            {}", config.obituary.address);
            println!();
            println!("[Photo]");
            println!("  Max bytes:          {}", config.photo.max_bytes);
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
