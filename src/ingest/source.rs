// src/ingest/source.rs
//! Fetch → parse → classify for one source. Never fails: every error ends
//! up in the returned `SourceStatus`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::join_all;
use metrics::counter;
use tracing::{debug, warn};

use crate::classify::SportClassifier;
use crate::ingest::providers::{feed, html};
use crate::ingest::types::{
    Article, CandidateArticle, PageFetcher, ParserKind, Source, SourceOutcome, SourceStatus,
};

/// Default per-request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(9_000);

pub struct SourceFetcher {
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<SportClassifier>,
    timeout: Duration,
}

impl SourceFetcher {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<SportClassifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            timeout,
        }
    }

    pub fn classifier(&self) -> &SportClassifier {
        &self.classifier
    }

    /// One bounded request; the timeout aborts the in-flight future.
    async fn get(&self, url: &str) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch_text(url)).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!("timed out after {}ms", self.timeout.as_millis())),
        }
    }

    async fn feed_candidates(&self, source: &Source) -> Result<Vec<CandidateArticle>> {
        let xml = self.get(&source.feed_url).await?;
        feed::parse_feed(&xml)
    }

    async fn html_candidates(&self, source: &Source) -> Result<Vec<CandidateArticle>> {
        let listing = self.get(&source.feed_url).await?;
        let links = html::extract_listing_links(source, &listing);
        if links.is_empty() {
            debug!(target: "ingest", source_id = %source.id, "listing yielded no article links");
            return Ok(Vec::new());
        }

        let pages = links
            .iter()
            .take(html::MAX_ARTICLE_PAGES)
            .map(|link| async move {
                match self.get(&link.url).await {
                    Ok(body) => {
                        html::parse_article_page(&link.url, &body, link.anchor_text.as_deref())
                    }
                    Err(e) => {
                        debug!(target: "ingest", url = %link.url, error = %e, "article page dropped");
                        None
                    }
                }
            });
        Ok(join_all(pages).await.into_iter().flatten().collect())
    }

    async fn candidates(&self, source: &Source) -> Result<Vec<CandidateArticle>> {
        match source.parser {
            ParserKind::Rss => self.feed_candidates(source).await,
            ParserKind::Html => self.html_candidates(source).await,
        }
    }

    /// Attach tags and source identity; rejected candidates are dropped.
    pub fn classify_all(&self, source: &Source, candidates: Vec<CandidateArticle>) -> Vec<Article> {
        let total = candidates.len();
        let kept: Vec<Article> = candidates
            .into_iter()
            .filter_map(|c| {
                let verdict = self.classifier.classify_candidate(&c);
                if !verdict.is_accepted() {
                    return None;
                }
                Some(Article {
                    id: c.id,
                    title: c.title,
                    link: c.link,
                    source: source.name.clone(),
                    source_id: source.id.clone(),
                    published_at: c.published_at,
                    excerpt: c.excerpt,
                    sports: verdict.tags,
                })
            })
            .collect();
        counter!("news_articles_kept_total").increment(kept.len() as u64);
        counter!("news_articles_rejected_total").increment((total - kept.len()) as u64);
        kept
    }

    /// Run the full sequence for one source.
    pub async fn fetch(&self, source: &Source) -> SourceOutcome {
        counter!("news_source_fetch_total").increment(1);
        match self.candidates(source).await {
            Ok(candidates) => {
                let articles = self.classify_all(source, candidates);
                let status = SourceStatus::ok(source, articles.len());
                SourceOutcome { articles, status }
            }
            Err(e) => {
                warn!(
                    target: "ingest",
                    source_id = %source.id,
                    fetcher = self.fetcher.name(),
                    error = %e,
                    "source fetch failed"
                );
                counter!("news_source_errors_total").increment(1);
                SourceOutcome {
                    articles: Vec::new(),
                    status: SourceStatus::failed(source, e.to_string()),
                }
            }
        }
    }
}
