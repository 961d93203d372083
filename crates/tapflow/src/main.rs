//! TapFlow - tap tempo tracker for the terminal
//!
//! Press Enter on every beat. Window size and reference tempo are persisted
//! and follow changes made by other running instances.

mod app;
mod cli;
mod input;
mod logging_setup;

use anyhow::Result;
use app::{Flow, TapApp};
use clap::Parser;
use crossbeam_channel::{never, select, Receiver};
use std::io::{self, Write};
use std::path::PathBuf;
use tapflow_core::{
    DisabledBackend, FileWatcher, JsonFileBackend, Origin, StorageEvent, TapflowConfig,
    TempoSettings,
};
use tracing::{error, info, warn};

/// Local storage for this run plus the file behind it, if any
fn open_origin(config: &TapflowConfig, persist: bool) -> (Origin, Option<PathBuf>) {
    if !persist {
        info!("Persistence disabled, settings live in memory");
        return (Origin::in_memory(), None);
    }
    let Some(path) = config.resolved_store_path() else {
        warn!("No data directory available for the settings store");
        return (
            Origin::new(DisabledBackend::new("no data directory")),
            None,
        );
    };
    match JsonFileBackend::open(&path) {
        Ok(backend) => {
            info!("Settings store: {:?}", backend.path());
            let path = backend.path().to_path_buf();
            (Origin::new(backend), Some(path))
        }
        Err(e) => {
            warn!("Cannot open settings store {:?}: {}", path, e);
            (Origin::new(DisabledBackend::new(e.to_string())), None)
        }
    }
}

/// What woke the event loop; `None` means the channel closed
enum Wake {
    Input(Option<input::Input>),
    Window(Option<StorageEvent>),
    Reference(Option<StorageEvent>),
}

fn events_or_never(receiver: Option<&Receiver<StorageEvent>>) -> Receiver<StorageEvent> {
    receiver.cloned().unwrap_or_else(never)
}

fn print_lines(lines: &mut Vec<String>) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines.drain(..) {
        if let Err(e) = writeln!(out, "{}", line) {
            error!("Failed to write output: {}", e);
            return;
        }
    }
    let _ = out.flush();
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    let config = args.resolve_config();

    let _log_guard = logging_setup::init(&config.log)?;
    info!("Starting TapFlow v{}", env!("CARGO_PKG_VERSION"));

    if args.save_config {
        match &args.config {
            Some(path) => config.save_to_path(path)?,
            None => config.save()?,
        }
        info!("Configuration saved");
    }

    let (origin, store_path) = open_origin(&config, !args.no_persist);
    let context = origin.open_context();

    let mut settings = TempoSettings::new(&context, config.scope, &config.version);
    if !settings.activate_or_fallback() {
        warn!("Settings are not persisted for this session");
    }

    // Dropping the watcher stops it; keep it for the whole session
    let _watcher = match (&store_path, config.watch_store) {
        (Some(path), true) => match FileWatcher::spawn(origin.local_area().clone(), path) {
            Ok(watcher) => {
                info!("Following changes to {:?}", watcher.path());
                Some(watcher)
            }
            Err(e) => {
                warn!("Not following external changes to {:?}: {}", path, e);
                None
            }
        },
        _ => None,
    };

    // Clones share the subscription's channel; they disconnect when it is dropped
    let mut window_events = events_or_never(settings.window_size_value().events());
    let mut reference_events = events_or_never(settings.reference_tempo_value().events());

    let mut app = TapApp::new(settings);
    let commands = input::spawn_reader();

    let mut out = vec![input::HELP.to_string(), app.status_lines().join(" | ")];
    print_lines(&mut out);

    loop {
        let wake = select! {
            recv(commands) -> msg => Wake::Input(msg.ok()),
            recv(window_events) -> msg => Wake::Window(msg.ok()),
            recv(reference_events) -> msg => Wake::Reference(msg.ok()),
        };
        match wake {
            Wake::Input(Some(input)) => {
                if app.handle_command(input.command, input.at, &mut out) == Flow::Quit {
                    break;
                }
            }
            Wake::Input(None) => {
                info!("End of input");
                break;
            }
            Wake::Window(Some(event)) | Wake::Reference(Some(event)) => {
                app.handle_storage_event(&event, &mut out);
                // Both settings see every key; drain the duplicates
                app.sync(&mut out);
            }
            Wake::Window(None) => window_events = never(),
            Wake::Reference(None) => reference_events = never(),
        }
        print_lines(&mut out);
    }

    info!(
        taps = app.tracker().tap_count(),
        samples = app.tracker().history().len(),
        persisted = app.settings().is_persistent(),
        "Session finished"
    );
    Ok(())
}
