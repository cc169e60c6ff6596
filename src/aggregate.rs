// src/aggregate.rs
//! Multi-source aggregation with a single cached snapshot.
//!
//! The snapshot is immutable and shared behind an `Arc`; a refresh builds a
//! complete new one and swaps the slot, so readers see either the old or
//! the new snapshot and never a partial one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::ingest::config::{load_sources_from, resolve_sources_path, select_sources};
use crate::ingest::source::SourceFetcher;
use crate::ingest::types::{Article, Source, SourceStatus};
use crate::ingest::url::normalize_url;
use crate::query::{apply_filters, NewsFeed, NewsQuery};

/// Default snapshot lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Supplies the raw source list once per aggregation cycle.
pub trait SourceLoader: Send + Sync {
    fn load(&self) -> Result<Vec<Source>>;
}

/// Reads the source list from disk on every cycle.
#[derive(Debug, Clone, Default)]
pub struct FileSourceLoader {
    path: Option<PathBuf>,
}

impl FileSourceLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Resolve the path from env/defaults at load time.
    pub fn from_env() -> Self {
        Self { path: None }
    }
}

impl SourceLoader for FileSourceLoader {
    fn load(&self) -> Result<Vec<Source>> {
        match &self.path {
            Some(p) => load_sources_from(p),
            None => load_sources_from(&resolve_sources_path()?),
        }
    }
}

/// Fixed in-memory source list.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceLoader(pub Vec<Source>);

impl SourceLoader for StaticSourceLoader {
    fn load(&self) -> Result<Vec<Source>> {
        Ok(self.0.clone())
    }
}

/// One complete aggregation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<Article>,
    pub sources: Vec<SourceStatus>,
}

/// Collapse articles sharing a normalized link. The entry with the newer
/// (or equal) timestamp wins; missing timestamps count as epoch. First-seen
/// position is kept.
pub fn dedupe_by_link(articles: Vec<Article>) -> Vec<Article> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Article> = Vec::with_capacity(articles.len());
    for mut a in articles {
        let key = normalize_url(&a.link);
        if key.is_empty() {
            continue;
        }
        a.link = key.clone();
        match index.get(&key) {
            Some(&i) => {
                if a.sort_key() >= out[i].sort_key() {
                    out[i] = a;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(a);
            }
        }
    }
    out
}

/// Newest first; undated articles sink to the end. Stable for ties.
pub fn sort_by_recency(mut articles: Vec<Article>) -> Vec<Article> {
    articles.sort_by_key(|a| std::cmp::Reverse(a.sort_key()));
    articles
}

pub struct NewsAggregator {
    loader: Arc<dyn SourceLoader>,
    fetcher: Arc<SourceFetcher>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    cache: RwLock<Option<Arc<Snapshot>>>,
    refresh: Mutex<()>,
}

impl NewsAggregator {
    pub fn new(
        loader: Arc<dyn SourceLoader>,
        fetcher: SourceFetcher,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            loader,
            fetcher: Arc::new(fetcher),
            clock,
            ttl,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn source_fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    /// The cached snapshot, if it is still within the TTL.
    fn fresh(&self) -> Option<Arc<Snapshot>> {
        let now = self.clock.now();
        let guard = self.cache.read().unwrap_or_else(|p| p.into_inner());
        guard
            .as_ref()
            .filter(|s| now - s.generated_at < self.ttl)
            .cloned()
    }

    /// Current snapshot; runs a full aggregation when missing or expired.
    /// Concurrent callers after expiry share one refresh.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(s) = self.fresh() {
            counter!("news_cache_hits_total").increment(1);
            return Ok(s);
        }

        let _refreshing = self.refresh.lock().await;
        if let Some(s) = self.fresh() {
            counter!("news_cache_hits_total").increment(1);
            return Ok(s);
        }

        let snap = Arc::new(self.aggregate().await?);
        *self.cache.write().unwrap_or_else(|p| p.into_inner()) = Some(snap.clone());
        gauge!("news_snapshot_ts").set(snap.generated_at.timestamp() as f64);
        Ok(snap)
    }

    /// Fetch every selected source concurrently and merge the results.
    /// Only a source-list failure is returned as an error.
    pub async fn aggregate(&self) -> Result<Snapshot> {
        let generated_at = self.clock.now();
        let t0 = Instant::now();

        let sources = select_sources(self.loader.load()?);

        let tasks = sources.iter().cloned().map(|source| {
            let fetcher = self.fetcher.clone();
            tokio::spawn(async move { fetcher.fetch(&source).await })
        });
        let results = join_all(tasks).await;

        let mut combined = Vec::new();
        let mut statuses = Vec::with_capacity(sources.len());
        for (source, res) in sources.iter().zip(results) {
            match res {
                Ok(outcome) => {
                    combined.extend(outcome.articles);
                    statuses.push(outcome.status);
                }
                Err(e) => {
                    warn!(target: "news_cache", source_id = %source.id, error = %e, "source task aborted");
                    counter!("news_source_errors_total").increment(1);
                    statuses.push(SourceStatus::failed(source, "Fetch failed"));
                }
            }
        }

        let before = combined.len();
        let articles = sort_by_recency(dedupe_by_link(combined));
        counter!("news_dedup_total").increment((before - articles.len()) as u64);
        counter!("news_cache_refresh_total").increment(1);
        histogram!("news_aggregate_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        info!(
            target: "news_cache",
            sources = statuses.len(),
            failed = statuses.iter().filter(|s| !s.ok).count(),
            articles = articles.len(),
            "aggregation cycle finished"
        );

        Ok(Snapshot {
            generated_at,
            articles,
            sources: statuses,
        })
    }

    /// Filtered view over the current snapshot.
    pub async fn get_articles(&self, query: &NewsQuery) -> Result<NewsFeed> {
        let snap = self.snapshot().await?;
        Ok(apply_filters(&snap, query))
    }

    /// Articles only, for callers that do not show source health.
    pub async fn articles(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        Ok(self.get_articles(query).await?.articles)
    }

    /// Sport tags the classifier can assign, in rule order.
    pub fn sport_ids(&self) -> Vec<String> {
        self.fetcher.classifier().tag_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn art(link: &str, ts: Option<i64>, source_id: &str) -> Article {
        Article {
            id: link.to_string(),
            title: format!("t {link}"),
            link: link.to_string(),
            source: source_id.to_string(),
            source_id: source_id.to_string(),
            published_at: ts.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            excerpt: None,
            sports: vec!["climbing".into()],
        }
    }

    #[test]
    fn dedupe_keeps_newer_duplicate() {
        let v = vec![
            art("https://a.scot/1?utm_source=x", Some(100), "s1"),
            art("https://a.scot/2", Some(50), "s1"),
            art("https://a.scot/1#top", Some(200), "s2"),
            art("https://a.scot/1", Some(150), "s3"),
        ];
        let out = dedupe_by_link(v);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].link, "https://a.scot/1");
        assert_eq!(out[0].source_id, "s2");
        assert_eq!(out[0].sort_key(), 200_000);
    }

    #[test]
    fn dedupe_treats_missing_time_as_epoch() {
        let out = dedupe_by_link(vec![
            art("https://a.scot/1", Some(10), "dated"),
            art("https://a.scot/1", None, "undated"),
        ]);
        assert_eq!(out[0].source_id, "dated");
    }

    #[test]
    fn recency_sort_puts_undated_last() {
        let out = sort_by_recency(vec![
            art("https://a.scot/old", Some(10), "s"),
            art("https://a.scot/none", None, "s"),
            art("https://a.scot/new", Some(20), "s"),
        ]);
        let links: Vec<_> = out.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://a.scot/new", "https://a.scot/old", "https://a.scot/none"]
        );
    }
}
