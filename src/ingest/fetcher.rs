// src/ingest/fetcher.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};

use crate::ingest::types::PageFetcher;

pub const DEFAULT_USER_AGENT: &str = "WildScotNewsAggregator/1.0";
const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml, text/html";

/// reqwest-backed fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .header(ACCEPT, ACCEPT_FEEDS)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {}", status.as_u16()));
        }
        Ok(resp.text().await?)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Canned reply for one URL.
#[derive(Debug, Clone)]
pub enum FixtureResponse {
    Body(String),
    Status(u16),
    /// Reply with the body after sleeping.
    Delayed(Duration, String),
}

/// In-memory fetcher for offline runs and tests. Unknown URLs answer
/// `HTTP 404`.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, FixtureResponse>,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages
            .insert(url.to_string(), FixtureResponse::Body(body.into()));
        self
    }

    pub fn status(mut self, url: &str, code: u16) -> Self {
        self.pages
            .insert(url.to_string(), FixtureResponse::Status(code));
        self
    }

    pub fn delayed(mut self, url: &str, delay: Duration, body: impl Into<String>) -> Self {
        self.pages
            .insert(url.to_string(), FixtureResponse::Delayed(delay, body.into()));
        self
    }

    /// Requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(FixtureResponse::Body(b)) => Ok(b.clone()),
            Some(FixtureResponse::Status(code)) => Err(anyhow!("HTTP {code}")),
            Some(FixtureResponse::Delayed(d, b)) => {
                tokio::time::sleep(*d).await;
                Ok(b.clone())
            }
            None => Err(anyhow!("HTTP 404")),
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
