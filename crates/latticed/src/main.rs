//! `latticed` -- JSON document store server.
//!
//! Parses CLI arguments, loads settings, opens the repository and blob
//! store, and serves the `/v1.0` API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use lattice_blob::{BlobStore, DirBlobStore};
use lattice_config::Settings;
use lattice_engine::IngestOptions;
use lattice_storage::{Repository, SqliteRepository};
use latticed::server::{AppState, router};

#[derive(Debug, Parser)]
#[command(name = "latticed", about = "JSON document store server", version)]
struct Cli {
    /// Path to the YAML settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the settings file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(listen) = cli.listen {
        settings.listen = listen;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .init();

    std::fs::create_dir_all(&settings.data_dir).with_context(|| {
        format!("creating data directory {}", settings.data_dir.display())
    })?;
    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let repo: Arc<dyn Repository> = Arc::new(
        SqliteRepository::open(&settings.database_path).context("opening metadata database")?,
    );
    let blobs: Arc<dyn BlobStore> = Arc::new(DirBlobStore::new(&settings.data_dir));

    // Locks from a crashed process are only ever reclaimed lazily; sweep
    // the obviously stale ones up front.
    let swept = repo.delete_expired_locks(settings.object_lock_expiration_seconds)?;
    if swept > 0 {
        info!(swept, "removed expired object locks at startup");
    }

    let options = IngestOptions {
        enable_object_locking: settings.enable_object_locking,
        lock_expiration_seconds: settings.object_lock_expiration_seconds,
        ..IngestOptions::default()
    };
    let state = AppState::new(repo, blobs, options);

    let listener = tokio::net::TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("binding {}", settings.listen))?;
    info!(listen = %settings.listen, data_dir = %settings.data_dir.display(), "latticed started");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
