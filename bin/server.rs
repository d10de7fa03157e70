// Trip Journal - Web Server
// Report and media cleanup endpoints over axum

use anyhow::{Context, Result};
use std::sync::Arc;
use trip_journal::api::{app, AppState};
use trip_journal::{logging, Config, FsMediaStore, SqliteExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let config = Config::load()?;

    let db = SqliteExecutor::open(&config.db_path)?;
    db.setup()?;
    tracing::info!(path = %config.db_path.display(), "database opened");

    // Create shared state
    let state = AppState {
        db: Arc::new(db),
        media: Arc::new(FsMediaStore::new(&config.media_root)),
        image_extensions: Arc::new(config.image_extensions.clone()),
    };

    let router = app(state, &config.media_root);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        media = %config.media_root.display(),
        "server running"
    );

    axum::serve(listener, router)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
