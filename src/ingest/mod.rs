// src/ingest/mod.rs
pub mod config;
pub mod fetcher;
pub mod providers;
pub mod scheduler;
pub mod source;
pub mod types;
pub mod url;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

/// Maximum excerpt length in characters.
pub const EXCERPT_MAX_CHARS: usize = 320;

/// Register HELP text for every series. Call after a recorder is installed;
/// descriptions sent to the no-op recorder are lost.
pub(crate) fn describe_metrics() {
    describe_counter!("news_source_fetch_total", "Source fetches attempted.");
    describe_counter!(
        "news_source_errors_total",
        "Source fetches that ended in a failed status."
    );
    describe_counter!(
        "news_articles_kept_total",
        "Articles accepted by the classifier."
    );
    describe_counter!(
        "news_articles_rejected_total",
        "Candidates rejected by the classifier."
    );
    describe_counter!("news_dedup_total", "Articles removed as URL duplicates.");
    describe_counter!("news_cache_hits_total", "Queries served from a fresh snapshot.");
    describe_counter!("news_cache_refresh_total", "Full aggregation cycles run.");
    describe_histogram!("news_aggregate_ms", "Aggregation cycle time in milliseconds.");
    describe_histogram!("news_parse_ms", "Feed parse time in milliseconds.");
    describe_gauge!("news_snapshot_ts", "Unix ts of the live snapshot.");
    describe_gauge!("news_cache_ttl_secs", "Configured snapshot lifetime.");
    describe_counter!("news_prewarm_runs_total", "Background prewarm ticks.");
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Decode entities and drop CDATA wrappers.
pub fn decode_entities(s: &str) -> String {
    let unwrapped = s.replace("<![CDATA[", "").replace("]]>", "");
    html_escape::decode_html_entities(&unwrapped).trim().to_string()
}

/// Entity decode, strip tags, collapse whitespace.
pub fn strip_tags(s: &str) -> String {
    let decoded = decode_entities(s);
    let no_tags = re_tags().replace_all(&decoded, " ");
    re_ws().replace_all(&no_tags, " ").trim().to_string()
}

/// `strip_tags` plus the excerpt length cap; `None` when nothing is left.
pub fn clean_text(s: &str) -> Option<String> {
    let out = strip_tags(s);
    if out.is_empty() {
        return None;
    }
    if out.chars().count() > EXCERPT_MAX_CHARS {
        return Some(out.chars().take(EXCERPT_MAX_CHARS).collect());
    }
    Some(out)
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// Parse a feed or page date. Unparseable input yields `None`.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return from_offset(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return from_offset(dt);
    }
    // chrono is more lenient with obsolete zone names ("GMT", "EST").
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
