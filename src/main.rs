//! Disclosure Watch — Binary Entrypoint
//! Runs one discovery/notification batch: poll every watcher, pipe unseen
//! candidates through fetch/extract/notify, persist the dedup state.
//!
//! See `README.md` for quickstart and `config/watchlist.toml` for the
//! issuer list format.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use disclosure_watch::config::Config;
use disclosure_watch::pipeline::Pipeline;
use disclosure_watch::state::SeenStore;
use disclosure_watch::watch;
use disclosure_watch::watchlist::Watchlist;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; a missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::from_env();
    let watchlist = Watchlist::load(&cfg.watchlist_path).with_context(|| {
        format!("loading watchlist from {}", cfg.watchlist_path.display())
    })?;
    if watchlist.is_empty() {
        warn!(path = %cfg.watchlist_path.display(), "watchlist has no issuers, nothing to poll");
    }

    let mut store = SeenStore::load(&cfg.state_file)?;
    let watchers = watch::build_watchers(&cfg, &watchlist)?;
    info!(
        watchers = watchers.len(),
        issuers = watchlist.issuers.len(),
        dry_run = cfg.dry_run,
        "disclosure watch starting"
    );

    let discoveries = watch::poll_all(&watchers).await;
    info!(candidates = discoveries.len(), "poll finished");

    let pipeline = Pipeline::new(&cfg)?;
    pipeline.run_batch(&discoveries, &mut store).await;

    store.save().context("saving seen-state")?;
    Ok(())
}
