//! WildScot news service: binary entrypoint.
//! Boots the Axum HTTP server with the news aggregator, metrics and an
//! optional cache prewarm task.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wildscot_news::api::{self, AppState};
use wildscot_news::config::NewsSettings;
use wildscot_news::ingest::scheduler::{spawn_prewarm, PrewarmCfg};
use wildscot_news::metrics::Metrics;

/// Compact logs by default, JSON when NEWS_LOG_JSON=1.
/// RUST_LOG overrides the default filter.
fn init_tracing() {
    let json = std::env::var("NEWS_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wildscot_news=info,warn"));

    // The runtime may already have installed a subscriber.
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = NewsSettings::from_env();
    tracing::info!(
        cache_ttl_secs = settings.cache_ttl.as_secs(),
        fetch_timeout_ms = settings.fetch_timeout.as_millis() as u64,
        prefetch = ?settings.prefetch_every,
        "starting news service"
    );

    // Recorder first so series descriptions land in it.
    let metrics = Metrics::init(settings.cache_ttl)
        .map_err(|e| tracing::warn!(error = ?e, "metrics disabled"))
        .ok();

    let news = Arc::new(wildscot_news::build_aggregator(&settings)?);

    if let Some(interval) = settings.prefetch_every {
        spawn_prewarm(news.clone(), PrewarmCfg { interval });
    }

    let mut router = api::router(AppState { news });
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
