mod backend_bridge;
mod console;
mod controller;
mod settings;

use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use listing_core::{
    channel_url, BridgeMode, ListingClient, ListingSource, PersistedConfig, TableSchema,
};
use shared::domain::ListingKind;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::commands::BackendCommand;
use crate::console::ConsoleAction;
use crate::controller::events::UiEvent;
use crate::controller::orchestration::dispatch_backend_command;
use crate::controller::session::ListingSession;
use crate::settings::{load_settings, AppSettings};

const DEFAULT_CHANNEL_PATH: &str = "/ws";

#[derive(Parser, Debug)]
#[command(name = "mylist", about = "Edit MyList room and shop listings")]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    manager: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    kind: Option<ListingKind>,
    #[arg(long)]
    mode: Option<BridgeMode>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Interactive editing session (default).
    Session,
    /// Fetch the listing once and print it.
    Load,
    /// Print the resolved settings.
    Settings,
}

impl Args {
    fn apply(&self, mut settings: AppSettings) -> AppSettings {
        if let Some(server_url) = &self.server_url {
            settings.server_url = server_url.clone();
        }
        if let Some(manager) = &self.manager {
            settings.manager = manager.clone();
        }
        if let Some(role) = &self.role {
            settings.role = role.clone();
        }
        if let Some(kind) = self.kind {
            settings.kind = kind;
        }
        if let Some(mode) = self.mode {
            settings.bridge_mode = mode;
        }
        settings
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let settings = args.apply(load_settings());

    match args.command.unwrap_or(Command::Session) {
        Command::Settings => {
            println!("{settings:#?}");
            Ok(())
        }
        Command::Load => run_load(&settings),
        Command::Session => run_session(settings),
    }
}

fn run_load(settings: &AppSettings) -> Result<()> {
    let client = ListingClient::new(&settings.server_url, settings.request_timeout)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let listing = runtime.block_on(client.fetch_rows(
        settings.kind,
        &settings.manager,
        &settings.role,
    ))?;
    let config = PersistedConfig::load(&settings.config_path);
    print!(
        "{}",
        console::render_table(
            &listing.rows,
            &TableSchema::for_kind(listing.kind),
            config.default_start_row
        )
    );
    Ok(())
}

fn run_session(settings: AppSettings) -> Result<()> {
    let client = ListingClient::new(&settings.server_url, settings.request_timeout)?;
    let config = PersistedConfig::load(&settings.config_path);

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    let backend = backend_bridge::runtime::launch(cmd_rx, ui_tx, Arc::new(client));
    let lines = spawn_stdin_reader();

    let mut session = ListingSession::new(
        settings.kind,
        settings.manager.clone(),
        settings.role.clone(),
        settings.bridge_mode,
        config,
    );
    println!("type 'help' for commands");
    session.request_load(&cmd_tx);
    print_status(&session);
    if settings.channel_path.is_some() {
        open_channel(&mut session, &cmd_tx, &settings, None);
    }

    loop {
        select! {
            recv(ui_rx) -> event => match event {
                Ok(event) => {
                    if session.handle_event(event) {
                        print_table(&session);
                    }
                    print_status(&session);
                }
                Err(_) => {
                    tracing::error!("backend worker stopped unexpectedly");
                    break;
                }
            },
            recv(lines) -> line => match line {
                Ok(line) => {
                    if !handle_line(&mut session, &cmd_tx, &settings, &line) {
                        break;
                    }
                }
                Err(_) => break,
            },
        }
    }

    session.teardown(&cmd_tx);
    let _ = cmd_tx.send(BackendCommand::Shutdown);
    if backend.join().is_err() {
        tracing::error!("backend worker panicked");
    }

    session.config_mut().last_directory = std::env::current_dir().ok();
    session.config().save(&settings.config_path);
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_line(
    session: &mut ListingSession,
    cmd_tx: &Sender<BackendCommand>,
    settings: &AppSettings,
    line: &str,
) -> bool {
    if session.awaiting_delete_confirmation() {
        if session.confirm_delete(console::parse_confirmation(line)) > 0 {
            print_table(session);
        }
        print_status(session);
        return true;
    }
    if line.trim().is_empty() {
        return true;
    }

    let start_row = session.config().default_start_row;
    let action = match console::parse_action(line, start_row) {
        Ok(action) => action,
        Err(message) => {
            println!("{message}");
            return true;
        }
    };

    match action {
        ConsoleAction::Show => print_table(session),
        ConsoleAction::Add(fields) => {
            if session.add_row(&fields).is_some() {
                print_table(session);
            }
        }
        ConsoleAction::Set {
            position,
            field,
            value,
        } => {
            session.update_cell(position, &field, &value);
        }
        ConsoleAction::Manager { positions, name } => {
            if session.change_manager(&positions, &name) > 0 {
                print_table(session);
            }
        }
        ConsoleAction::Delete(positions) => session.request_delete(positions),
        ConsoleAction::Pending => {
            print!(
                "{}",
                console::render_pending(&session.bridge().pending_changes())
            );
        }
        ConsoleAction::Save => {
            session.request_save(cmd_tx);
        }
        ConsoleAction::Reload => {
            let unsaved = session.bridge().pending_changes().len();
            if unsaved > 0 {
                tracing::warn!(unsaved, "reload discards unsaved changes");
            }
            session.request_load(cmd_tx);
        }
        ConsoleAction::Mode(mode) => {
            session.bridge_mut().set_mode(mode);
            session.set_status(format!(
                "Command path: {mode:?} ({} fallbacks so far)",
                session.bridge().fallback_count()
            ));
        }
        ConsoleAction::StartRow(start_row) => {
            session.config_mut().default_start_row = start_row;
            session.set_status(format!("Rows now numbered from {start_row}"));
        }
        ConsoleAction::Connect(path) => open_channel(session, cmd_tx, settings, path.as_deref()),
        ConsoleAction::Send(message) => {
            let mut status = String::new();
            if dispatch_backend_command(cmd_tx, BackendCommand::SendChannel { message }, &mut status)
            {
                status = "Message queued".to_string();
            }
            session.set_status(status);
        }
        ConsoleAction::Help => println!("{}", console::HELP),
        ConsoleAction::Quit => return false,
    }
    print_status(session);
    true
}

fn open_channel(
    session: &mut ListingSession,
    cmd_tx: &Sender<BackendCommand>,
    settings: &AppSettings,
    path: Option<&str>,
) {
    let path = path
        .or(settings.channel_path.as_deref())
        .unwrap_or(DEFAULT_CHANNEL_PATH);
    match channel_url(&settings.server_url, path) {
        Ok(url) => {
            let mut status = format!("Connecting to {url}...");
            dispatch_backend_command(cmd_tx, BackendCommand::OpenChannel { url }, &mut status);
            session.set_status(status);
        }
        Err(err) => session.set_status(format!("Channel error: {err:#}")),
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = bounded(64);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_table(session: &ListingSession) {
    let Some(state) = session.bridge().state() else {
        return;
    };
    print!(
        "{}",
        console::render_table(
            state.store.rows(),
            &state.schema,
            session.config().default_start_row
        )
    );
}

fn print_status(session: &ListingSession) {
    if !session.status().is_empty() {
        println!("[{}] {}", session.kind().as_str(), session.status());
    }
}
