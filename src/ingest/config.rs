// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::Source;

pub const ENV_SOURCES_PATH: &str = "NEWS_SOURCES_PATH";

/// Source ids allowed into the aggregation regardless of what the file says.
pub const TRUSTED_SOURCE_IDS: &[&str] = &[
    "scottish-surfing",
    "snowsport-scotland",
    "paddle-scotland",
    "mountaineering-scotland",
    "dmbin-scotland",
    "outdoor-swimming-society",
    "singletrack-magazine",
    "carve-magazine",
    "surfers-against-sewage",
];

/// Load the raw source list from an explicit path. Supports JSON or TOML.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading news sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing news sources in {}", path.display()))
}

/// Resolve the source list path:
/// 1) $NEWS_SOURCES_PATH
/// 2) config/news_sources.json
/// 3) config/news_sources.toml
pub fn resolve_sources_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(pb);
        }
        return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
    }
    let json_p = PathBuf::from("config/news_sources.json");
    if json_p.exists() {
        return Ok(json_p);
    }
    let toml_p = PathBuf::from("config/news_sources.toml");
    if toml_p.exists() {
        return Ok(toml_p);
    }
    Err(anyhow!("no news source list found (set {ENV_SOURCES_PATH})"))
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    if hint_ext == "toml" {
        return parse_toml(s);
    }
    match parse_json(s) {
        Ok(v) => Ok(v),
        Err(json_err) => parse_toml(s).map_err(|_| json_err),
    }
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<Source>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    Ok(serde_json::from_str(s)?)
}

/// Keep enabled, approved, trusted sources; order by tier then name,
/// ignoring case.
pub fn select_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut out: Vec<Source> = sources
        .into_iter()
        .filter(|s| s.enabled != Some(false))
        .filter(|s| s.approved == Some(true))
        .filter(|s| TRUSTED_SOURCE_IDS.contains(&s.id.as_str()))
        .collect();
    out.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    out
}
