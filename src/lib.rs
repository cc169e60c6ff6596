// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod query;

use std::sync::Arc;

pub use crate::aggregate::NewsAggregator;
pub use crate::api::router;
pub use crate::query::{NewsFeed, NewsQuery};

use crate::aggregate::FileSourceLoader;
use crate::classify::SportClassifier;
use crate::clock::SystemClock;
use crate::config::NewsSettings;
use crate::ingest::fetcher::HttpFetcher;
use crate::ingest::source::SourceFetcher;

/// Wire the production aggregator: HTTP fetcher, classifier rules from
/// file or built-in, source list from disk, system clock.
pub fn build_aggregator(settings: &NewsSettings) -> anyhow::Result<NewsAggregator> {
    let classifier = match &settings.classifier_path {
        Some(p) => SportClassifier::from_path(p)?,
        None => SportClassifier::from_toml()?,
    };
    let loader = match &settings.sources_path {
        Some(p) => FileSourceLoader::new(p.clone()),
        None => FileSourceLoader::from_env(),
    };
    let fetcher = SourceFetcher::new(
        Arc::new(HttpFetcher::new(settings.fetch_timeout)?),
        Arc::new(classifier),
        settings.fetch_timeout,
    );
    Ok(NewsAggregator::new(
        Arc::new(loader),
        fetcher,
        Arc::new(SystemClock),
        settings.cache_ttl,
    ))
}
