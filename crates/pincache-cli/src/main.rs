//! pincache - drop pins on a map and keep an offline cache of nearby photos.

mod cli;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use pincache_core::utils::{format_bytes, format_sync_age};
use pincache_core::{Config, FlickrClient, LocalStore, PinId, SyncOrchestrator};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Command, USAGE};

/// Prefix for the daily rolling log file
const LOG_FILE_PREFIX: &str = "pincache.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when a log directory is available, to a daily
/// rolling file. The returned guard must be held until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let log_dir = Config::data_dir().ok().map(|dir| dir.join("logs"));
    let _guard = init_tracing(log_dir.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        print!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    if config.mark_launched() {
        info!("First launch");
        if let Err(e) = config.save() {
            warn!("Failed to save config: {}", e);
        }
    }

    let store = LocalStore::open(config.store_dir()?).context("Failed to open the local store")?;
    let result = run(command, &mut config, store.clone()).await;
    if let Err(e) = store.close().await {
        warn!("Failed to close store: {}", e);
    }
    result
}

async fn run(command: Command, config: &mut Config, store: LocalStore) -> Result<()> {
    match command {
        Command::Drop(coordinate) => {
            let sync = orchestrator(config, store)?;
            let (pin, outcome) = sync.drop_pin(coordinate).await?;
            println!("Pin {} at {}: {}", pin, coordinate, outcome.describe());
        }
        Command::More(pin) => {
            let sync = orchestrator(config, store)?;
            let outcome = sync.new_collection(pin).await?;
            println!("Pin {}: {}", pin, outcome.describe());
        }
        Command::Refresh(pin) => {
            let sync = orchestrator(config, store)?;
            let outcome = sync.refresh(pin).await?;
            println!("Pin {}: {}", pin, outcome.describe());
        }
        Command::Pins => {
            let snapshot = store.snapshot();
            for pin in snapshot.pins() {
                println!(
                    "{:>4}  {:<24} page {:<3} {:>3} photos  synced {}",
                    pin.id,
                    pin.coordinate().to_string(),
                    pin.page_number,
                    snapshot.photos_for(pin.id).len(),
                    format_sync_age(pin)
                );
            }
            let counts = snapshot.counts();
            println!(
                "{} pins, {} photos ({})",
                counts.pins,
                counts.photos,
                format_bytes(counts.bytes)
            );
        }
        Command::Find(coordinate) => match store.snapshot().find_pin(coordinate) {
            Some(pin) => println!("Pin {} (page {})", pin.id, pin.page_number),
            None => println!("No pin at {}", coordinate),
        },
        Command::Photos(pin) => {
            require_pin(&store, pin)?;
            for photo in store.photos_for(pin) {
                println!(
                    "{:>6}  {:>9}  {}",
                    photo.id,
                    format_bytes(photo.size()),
                    photo.source_url.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Export(pin, dir) => {
            require_pin(&store, pin)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let photos = store.photos_for(pin);
            for photo in &photos {
                let path = dir.join(format!("{}.jpg", photo.id));
                std::fs::write(&path, &photo.image_data)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            println!("Exported {} photos to {}", photos.len(), dir.display());
        }
        Command::Delete(pin) => {
            let removed = store.delete_pin(pin).await?;
            println!("Deleted pin {} and {} photos", pin, removed);
        }
        Command::RemovePhotos(pin, ids) => {
            let removed = store.delete_photos(pin, ids).await?;
            println!("Removed {} photos from pin {}", removed, pin);
        }
        Command::ShowRegion => match &config.map_region {
            Some(region) => println!(
                "{} (span {:.4} x {:.4})",
                region.center, region.latitude_delta, region.longitude_delta
            ),
            None => println!("No saved map region"),
        },
        Command::SetRegion(region) => {
            config.map_region = Some(region);
            config.save()?;
            println!("Saved map region centered on {}", region.center);
        }
        Command::Reset => {
            store.drop_all().await?;
            println!("Store at {} reset", store.root().display());
        }
        Command::Help => print!("{}", USAGE),
    }
    Ok(())
}

fn orchestrator(config: &Config, store: LocalStore) -> Result<SyncOrchestrator<FlickrClient>> {
    let client = FlickrClient::new(config.api_key()?)?;
    Ok(SyncOrchestrator::new(client, store))
}

fn require_pin(store: &LocalStore, pin: PinId) -> Result<()> {
    store
        .pin(pin)
        .map(|_| ())
        .ok_or_else(|| anyhow::anyhow!("No pin with id {}", pin))
}
