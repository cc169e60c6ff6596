// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregate::NewsAggregator;

#[derive(Clone, Copy, Debug)]
pub struct PrewarmCfg {
    pub interval: Duration,
}

/// Spawn a background task that keeps the snapshot warm. Each tick asks the
/// aggregator for its snapshot, which only refetches when the cached one has
/// expired. The first tick fires immediately.
pub fn spawn_prewarm(news: Arc<NewsAggregator>, cfg: PrewarmCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            counter!("news_prewarm_runs_total").increment(1);
            match news.snapshot().await {
                Ok(snap) => tracing::debug!(
                    target: "news_cache",
                    articles = snap.articles.len(),
                    generated_at = %snap.generated_at,
                    "prewarm tick"
                ),
                Err(e) => tracing::warn!(target: "news_cache", error = ?e, "prewarm failed"),
            }
        }
    })
}
