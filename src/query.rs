// src/query.rs
//! Filtered, bounded reads over a snapshot.
//!
//! `total` is the number of articles matching the sport/search filters
//! before `limit` is applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::Snapshot;
use crate::ingest::types::{Article, SourceStatus};

pub const DEFAULT_LIMIT: usize = 60;
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 120;

/// Sport id that disables the sport filter.
pub const ALL_SPORTS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub sport: Option<String>,
    pub search: Option<String>,
    /// Already clamped into `MIN_LIMIT..=MAX_LIMIT`.
    pub limit: usize,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            sport: None,
            search: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl NewsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sport(mut self, sport: impl Into<String>) -> Self {
        self.sport = Some(sport.into());
        self
    }

    pub fn search(mut self, q: impl Into<String>) -> Self {
        self.search = Some(q.into());
        self
    }

    /// Clamp a numeric limit into `MIN_LIMIT..=MAX_LIMIT`.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = clamp_limit(limit as f64);
        self
    }
}

fn clamp_limit(v: f64) -> usize {
    if !v.is_finite() {
        return DEFAULT_LIMIT;
    }
    v.floor().clamp(MIN_LIMIT as f64, MAX_LIMIT as f64) as usize
}

/// Parse a `limit` query parameter: absent or non-numeric gives the
/// default, numbers are floored and clamped.
pub fn parse_limit(raw: Option<&str>) -> usize {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => DEFAULT_LIMIT,
        Some(s) => s.parse::<f64>().map(clamp_limit).unwrap_or(DEFAULT_LIMIT),
    }
}

/// Query result as returned to renderers and the JSON endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsFeed {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub articles: Vec<Article>,
    pub sources: Vec<SourceStatus>,
}

fn matches_search(a: &Article, needle: &str) -> bool {
    a.title.to_lowercase().contains(needle)
        || a
            .excerpt
            .as_deref()
            .is_some_and(|e| e.to_lowercase().contains(needle))
        || a.source.to_lowercase().contains(needle)
}

/// Apply sport and search filters, then the limit. Recency order is kept
/// and the full source status list is always returned.
pub fn apply_filters(snap: &Snapshot, query: &NewsQuery) -> NewsFeed {
    let sport = query
        .sport
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ALL_SPORTS);
    let needle = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let filtered: Vec<&Article> = snap
        .articles
        .iter()
        .filter(|a| sport.map_or(true, |s| a.sports.iter().any(|t| t == s)))
        .filter(|a| needle.as_deref().map_or(true, |n| matches_search(a, n)))
        .collect();

    let total = filtered.len();
    let take = query.limit.clamp(MIN_LIMIT, MAX_LIMIT);
    NewsFeed {
        generated_at: snap.generated_at,
        total,
        articles: filtered.into_iter().take(take).cloned().collect(),
        sources: snap.sources.clone(),
    }
}
