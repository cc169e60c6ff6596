// src/ingest/url.rs
//! Canonical article URLs: fragment removed, tracking parameters dropped.

use url::Url;

/// Query parameters that never identify content.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "ref", "ref_src", "source", "spm",
];

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Normalize an article URL into its identity form.
///
/// Input that is not a parseable absolute URL comes back trimmed and
/// otherwise unchanged.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    parsed.set_fragment(None);

    if let Some(query) = parsed.query().map(filter_query) {
        parsed.set_query(query.as_deref());
    }

    parsed.to_string()
}

/// Drop tracking pairs from a raw query. Kept segments are copied byte for
/// byte; `None` when nothing is left.
fn filter_query(raw: &str) -> Option<String> {
    let kept: Vec<&str> = raw
        .split('&')
        .filter(|seg| {
            let key = seg.split('=').next().unwrap_or_default();
            !is_tracking_param(key)
        })
        .collect();
    let joined = kept.join("&");
    (!joined.is_empty()).then_some(joined)
}

/// Resolve `href` against `base` and normalize the result.
pub fn absolute_url(href: &str, base: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href.trim())) {
        Ok(u) => normalize_url(u.as_str()),
        Err(_) => normalize_url(href),
    }
}

/// True for absolute `http`/`https` URLs.
pub fn is_http_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Path fragments of pages that are never articles (live blogs, scores).
const NON_ARTICLE_FRAGMENTS: &[&str] = &[
    "/live/", "/scores", "/fixtures", "/football", "/cricket", "/olympic",
];

/// File suffixes of non-page links.
const NON_ARTICLE_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".pdf"];

/// Known non-article URL patterns, matched case-insensitively.
pub fn is_non_article_path(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    NON_ARTICLE_FRAGMENTS.iter().any(|f| lower.contains(f))
        || NON_ARTICLE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Host (with port, if any) of an absolute URL.
pub fn host_of(raw: &str) -> Option<String> {
    let u = Url::parse(raw.trim()).ok()?;
    let host = u.host_str()?.to_ascii_lowercase();
    Some(match u.port() {
        Some(p) => format!("{host}:{p}"),
        None => host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment_and_tracking() {
        assert_eq!(
            normalize_url("https://x.com/a?utm_source=foo&ref=bar#frag"),
            normalize_url("https://x.com/a")
        );
        assert_eq!(normalize_url("https://x.com/a"), "https://x.com/a");
    }

    #[test]
    fn keeps_content_params_in_order() {
        assert_eq!(
            normalize_url("https://x.com/a?id=7&UTM_Medium=x&page=2&fbclid=abc"),
            "https://x.com/a?id=7&page=2"
        );
    }

    #[test]
    fn kept_query_is_not_reencoded() {
        assert_eq!(
            normalize_url("https://a.scot/story?preview"),
            "https://a.scot/story?preview"
        );
        assert_eq!(
            normalize_url("https://a.scot/story?tag=sea%20kayak&amp"),
            "https://a.scot/story?tag=sea%20kayak&amp"
        );
        assert_eq!(
            normalize_url("https://a.scot/story?tag=sea%20kayak&utm_source=x&preview"),
            "https://a.scot/story?tag=sea%20kayak&preview"
        );
        assert_eq!(normalize_url("https://a.scot/story?"), "https://a.scot/story");
    }

    #[test]
    fn non_urls_are_trimmed_only() {
        assert_eq!(normalize_url("  /relative/path  "), "/relative/path");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            absolute_url("/news/story-1?utm_campaign=z", "https://club.scot/news/"),
            "https://club.scot/news/story-1"
        );
        assert_eq!(
            absolute_url("story-2", "https://club.scot/news/"),
            "https://club.scot/news/story-2"
        );
    }

    #[test]
    fn host_includes_port_and_lowercases() {
        assert_eq!(host_of("https://Club.Scot/x").as_deref(), Some("club.scot"));
        assert_eq!(
            host_of("http://127.0.0.1:8080/x").as_deref(),
            Some("127.0.0.1:8080")
        );
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn http_url_check() {
        assert!(is_http_url("https://club.scot/a"));
        assert!(!is_http_url("mailto:hi@club.scot"));
        assert!(!is_http_url("abc123"));
    }

    #[test]
    fn non_article_paths() {
        assert!(is_non_article_path("https://bbc.co.uk/sport/LIVE/123"));
        assert!(is_non_article_path("https://club.scot/results/scores"));
        assert!(is_non_article_path("https://club.scot/map.PDF"));
        assert!(!is_non_article_path("https://club.scot/news/skye-kayak-trip"));
    }
}
