pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use api::*;
pub use error::AggregatorError;
pub use models::*;
pub use utils::*;

use anyhow::{Context, Result};
use api::content_api::ContentApiClient;
use config::Settings;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use utils::data::{load_from_cache, save_to_cache};
use utils::repository::{replace_snapshot, SharedStore};

/// Load the content snapshot from the JSON cache or the content API.
///
/// With `USE_CACHE=1` and an existing cache file the API is not touched;
/// otherwise a fresh snapshot is fetched and written to the cache.
pub async fn load_snapshot(settings: &Settings) -> Result<Snapshot> {
    let cache_file = settings.snapshot_cache_file();

    if settings.use_cache && cache_file.exists() {
        tracing::info!(file = %cache_file.display(), "loading snapshot from cache");
        return load_from_cache(&cache_file);
    }

    let client = ContentApiClient::new(settings.content_api_url.as_str());
    let snapshot = client
        .fetch_snapshot()
        .await
        .context("Failed to fetch snapshot from content API")?;

    save_to_cache(&snapshot, &cache_file)?;
    tracing::info!(file = %cache_file.display(), "saved snapshot to cache");

    Ok(snapshot)
}

/// Reload the snapshot every `REFRESH_SECS` and swap it into `shared`.
///
/// Not started when refreshing is off or the snapshot comes from the cache.
/// A failed reload keeps serving the previous snapshot.
pub fn spawn_refresh(shared: SharedStore, settings: Settings) -> Option<JoinHandle<()>> {
    if settings.refresh_secs == 0 || settings.use_cache {
        tracing::info!(
            refresh_secs = settings.refresh_secs,
            use_cache = settings.use_cache,
            "snapshot refresh disabled"
        );
        return None;
    }

    let period = Duration::from_secs(settings.refresh_secs);
    Some(tokio::spawn(async move {
        // The startup load already happened, so the first tick waits a full period
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match load_snapshot(&settings).await {
                Ok(snapshot) => {
                    let loaded_at = replace_snapshot(&shared, snapshot).await;
                    tracing::info!(%loaded_at, "snapshot refreshed");
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "snapshot refresh failed, keeping previous data");
                }
            }
        }
    }))
}
