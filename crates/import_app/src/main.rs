//! CLI host for the import engine.
//!
//! Feed items come from a JSON file (the live XML transport is a host
//! concern); documents and taxonomy terms live in memory for the duration
//! of a run, media files and the schedule offset persist on disk.

mod input;
mod logging;
mod media_store;
mod persist;
mod settings;

use std::path::PathBuf;

use import_engine::{
    run_tick, FetchSettings, HttpDownloader, ImportError, Importer, ImporterDeps,
    LogStatus, MemoryDocumentStore, MemoryTaxonomy, MemoryTransport, RecordingLog, StoreError,
};
use import_logging::import_error;
use thiserror::Error;

use crate::media_store::DiskMediaStore;
use crate::persist::PersistError;

const USAGE: &str = "usage: import_app <settings.ron> <items.json> <import|tick|reset-offset> [data-dir]";

#[derive(Debug, Error)]
enum AppError {
    #[error("{USAGE}")]
    Usage,
    #[error(transparent)]
    Settings(#[from] settings::SettingsError),
    #[error(transparent)]
    Input(#[from] input::InputError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn main() {
    logging::initialize(logging::LogDestination::Both);
    if let Err(err) = run() {
        import_error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (settings_path, items_path, command) = match args.as_slice() {
        [settings, items, command] | [settings, items, command, _] => {
            (PathBuf::from(settings), PathBuf::from(items), command.as_str())
        }
        _ => return Err(AppError::Usage),
    };
    let data_dir = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./import_data"));

    let loaded = settings::load(&settings_path)?;
    let feeds = input::load_items(&items_path)?;

    let transport = MemoryTransport::new();
    for (feed_url, items) in feeds {
        transport.set_items(&feed_url, items);
    }

    let downloader = HttpDownloader::new(FetchSettings::default())?;
    let media = DiskMediaStore::open(data_dir.join("media"), downloader);
    let documents = MemoryDocumentStore::new();
    let taxonomy = MemoryTaxonomy::new();
    let log = RecordingLog::new();

    let importer = Importer::new(
        ImporterDeps {
            transport: &transport,
            documents: &documents,
            media: &media,
            taxonomy: &taxonomy,
            log: &log,
        },
        &loaded.settings,
        &loaded.category_rules,
        &loaded.utm_rules,
    );

    match command {
        "import" => {
            let items = importer.fetch_window(0)?;
            let outcome = importer.import_batch(&items);
            println!(
                "imported {}, skipped {}, errors {}",
                outcome.imported, outcome.skipped, outcome.errors
            );
        }
        "tick" => {
            let mut state = persist::load_schedule_state(&data_dir);
            let report = run_tick(&importer, &mut state)?;
            persist::save_schedule_state(&data_dir, &state)?;
            println!(
                "imported {}, skipped {}, errors {}; offset {} -> {}; drift {}, resynced {}",
                report.batch.imported,
                report.batch.skipped,
                report.batch.errors,
                report.offset_before,
                report.offset_after,
                report.drift_detected,
                report.resynced
            );
        }
        "reset-offset" => {
            let mut state = persist::load_schedule_state(&data_dir);
            state.reset();
            persist::save_schedule_state(&data_dir, &state)?;
            println!("offset reset to 0");
        }
        _ => return Err(AppError::Usage),
    }

    media.save_index()?;

    for entry in log.entries() {
        if matches!(entry.status, LogStatus::Warning | LogStatus::Error) {
            eprintln!("[{}] {}: {}", entry.status, entry.source_ref, entry.message);
        }
    }
    Ok(())
}
