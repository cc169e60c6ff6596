// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a source's `feedUrl` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// RSS or Atom XML (detected from the payload).
    Rss,
    /// HTML listing page whose links are followed to article pages.
    Html,
}

/// One configured news source, as read from the source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub name: String,
    pub feed_url: String,
    pub parser: ParserKind,
    /// Priority tier, lower is more important (1 | 2).
    pub tier: u8,
    #[serde(default)]
    pub homepage_url: Option<String>,
    /// Only used by the HTML parser; case-insensitive URL substrings.
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub approved: Option<bool>,
}

/// Parsed, not yet classified article. Lives only within one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArticle {
    pub id: String,
    pub title: String,
    /// Raw link as found in the payload.
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: Option<String>,
}

/// Classified article stored in the snapshot and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    /// Normalized absolute URL; dedupe key.
    pub link: String,
    /// Source display name.
    pub source: String,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub sports: Vec<String>,
}

impl Article {
    /// Unix millis used for ordering; missing timestamps count as epoch.
    pub fn sort_key(&self) -> i64 {
        self.published_at
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Per-source outcome of one aggregation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub source_id: String,
    pub source_name: String,
    pub ok: bool,
    pub article_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn ok(source: &Source, article_count: usize) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            ok: true,
            article_count,
            error: None,
        }
    }

    pub fn failed(source: &Source, error: impl Into<String>) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            ok: false,
            article_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Articles plus status for one source.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub articles: Vec<Article>,
    pub status: SourceStatus,
}

/// Retrieves a page body as text. Implementations must treat non-2xx
/// responses as errors.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}
