//! Logging setup.
//!
//! Structured `tracing` output on stderr. The level is read from the
//! `TRIP_JOURNAL_LOG` environment variable using `EnvFilter` syntax:
//! - `TRIP_JOURNAL_LOG=debug` also logs every executed query
//! - `TRIP_JOURNAL_LOG=info` for report and cleanup outcomes (default)
//! - `TRIP_JOURNAL_LOG=warn` for failed deletions and suspicious filters only

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "TRIP_JOURNAL_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init() -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Logging initialized");
    Ok(())
}
