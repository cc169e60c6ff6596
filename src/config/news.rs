// src/config/news.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregate::DEFAULT_CACHE_TTL;
use crate::classify::ENV_CLASSIFIER_PATH;
use crate::ingest::config::ENV_SOURCES_PATH;
use crate::ingest::source::DEFAULT_FETCH_TIMEOUT;

pub const ENV_CACHE_TTL_SECS: &str = "NEWS_CACHE_TTL_SECS";
pub const ENV_FETCH_TIMEOUT_MS: &str = "NEWS_FETCH_TIMEOUT_MS";
pub const ENV_PREFETCH_SECS: &str = "NEWS_PREFETCH_SECS";

/// Runtime knobs read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsSettings {
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    /// Background pre-warm interval; `None` disables the task.
    pub prefetch_every: Option<Duration>,
    pub sources_path: Option<PathBuf>,
    pub classifier_path: Option<PathBuf>,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            prefetch_every: None,
            sources_path: None,
            classifier_path: None,
        }
    }
}

fn positive_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

fn non_empty_path(raw: Option<String>) -> Option<PathBuf> {
    raw.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl NewsSettings {
    /// Read settings from the process environment. Unparseable or zero
    /// values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            cache_ttl: positive_u64(get(ENV_CACHE_TTL_SECS))
                .map(Duration::from_secs)
                .unwrap_or(d.cache_ttl),
            fetch_timeout: positive_u64(get(ENV_FETCH_TIMEOUT_MS))
                .map(Duration::from_millis)
                .unwrap_or(d.fetch_timeout),
            prefetch_every: positive_u64(get(ENV_PREFETCH_SECS)).map(Duration::from_secs),
            sources_path: non_empty_path(get(ENV_SOURCES_PATH)),
            classifier_path: non_empty_path(get(ENV_CLASSIFIER_PATH)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let s = NewsSettings::from_lookup(lookup(&[]));
        assert_eq!(s, NewsSettings::default());
        assert_eq!(s.cache_ttl, Duration::from_secs(900));
        assert_eq!(s.fetch_timeout, Duration::from_millis(9_000));
    }

    #[test]
    fn parses_values_and_ignores_garbage() {
        let s = NewsSettings::from_lookup(lookup(&[
            ("NEWS_CACHE_TTL_SECS", "60"),
            ("NEWS_FETCH_TIMEOUT_MS", "abc"),
            ("NEWS_PREFETCH_SECS", "0"),
            ("NEWS_SOURCES_PATH", " /tmp/s.json "),
            ("NEWS_CLASSIFIER_PATH", ""),
        ]));
        assert_eq!(s.cache_ttl, Duration::from_secs(60));
        assert_eq!(s.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
        assert_eq!(s.prefetch_every, None);
        assert_eq!(s.sources_path, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(s.classifier_path, None);
    }
}
