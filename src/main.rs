//! Soundscape - adaptive background music pack inspector
//!
//! Command line entry point. Loads the settings from a config directory,
//! discovers every pack under the pack root and prints what the host would
//! see: the pack table, discovery diagnostics and the generated `sounds.json`.
//!
//! # Usage
//!
//! ```text
//! soundscape [CONFIG_DIR]
//! ```
//!
//! `CONFIG_DIR` defaults to `Soundscape Data`. It holds:
//! - `soundscape.yaml`: settings (created with defaults when missing)
//! - `active_packs.json`: enabled pack ids (created on first discovery)
//! - `logs/`: daily rotated log files
//!
//! Settings can be overridden with `SOUNDSCAPE_*` environment variables, e.g.
//! `SOUNDSCAPE_PACK_ROOT=/srv/packs` or `SOUNDSCAPE_HEURISTICS__COMBAT_RADIUS=16`.

use anyhow::{Context, Result};
use soundscape::logging::{LogOptions, setup_logging};
use soundscape::{APP_NAME, ConfigManager, MusicSession, VERSION};

fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Soundscape Data".to_string());

    let config_manager = ConfigManager::new(&config_dir)?;
    let settings = config_manager.load_settings()?;

    let log_dir = config_manager.log_dir();
    let _guard = setup_logging(&LogOptions {
        log_dir: &log_dir,
        log_prefix: "soundscape",
        debug_mode: settings.debug_mode,
        console_output: true,
        json_file: false,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    // Background runtime for catalog change notifications
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(1)
        .thread_name("soundscape-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let session = MusicSession::new(settings, &config_manager)?;

    let mut changes = session.catalog().subscribe();
    runtime.spawn(async move {
        while let Ok(change) = changes.recv().await {
            tracing::info!("Catalog change: {:?}", change);
        }
    });

    let report = session.reload()?;

    let catalog = session.catalog();
    let view = catalog.view();
    println!(
        "{} v{} | pack root: {} | revision {}",
        APP_NAME,
        VERSION,
        catalog.pack_root(),
        report.revision
    );
    println!();
    println!(
        "{:<24} {:<7} {:<16} {:>6} {:>6}  {}",
        "PACK", "ACTIVE", "NAMESPACE", "FORMAT", "TRACKS", "DESCRIPTION"
    );
    for pack in view.generation.packs() {
        let tracks = view
            .generation
            .tracks()
            .iter()
            .filter(|t| t.owner_pack_id == pack.id)
            .count();
        println!(
            "{:<24} {:<7} {:<16} {:>6} {:>6}  {}",
            pack.id,
            if view.is_active(&pack.id) { "yes" } else { "no" },
            pack.namespace,
            pack.pack_format,
            tracks,
            pack.description
        );
    }

    if report.has_errors() {
        println!();
        println!("Diagnostics:");
        for diagnostic in &report.diagnostics {
            println!("  - {}", diagnostic);
        }
    }

    let manifest = session
        .provider()
        .manifest_json()
        .context("Failed to generate manifest")?;
    println!();
    println!("{}:sounds.json", session.provider().namespace());
    println!("{}", String::from_utf8_lossy(&manifest));

    session.metrics().log_summary();

    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    tracing::info!("Shutdown complete");

    Ok(())
}
