// src/ingest/providers/html.rs
//! HTML listing pages: collect same-host article links, then read title,
//! excerpt and publish time from each article page.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use crate::ingest::types::{CandidateArticle, Source};
use crate::ingest::url::{absolute_url, host_of, is_http_url, is_non_article_path, normalize_url};
use crate::ingest::{clean_text, parse_published};

/// Links taken from one listing page.
pub const MAX_LISTING_LINKS: usize = 16;
/// Article pages fetched per listing.
pub const MAX_ARTICLE_PAGES: usize = 10;

/// Candidate link from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub url: String,
    pub anchor_text: Option<String>,
}

fn sel(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn lowered(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Extract candidate article links from a listing page.
///
/// Links are resolved against the source's `feed_url`, must share host
/// with `homepage_url` (or `feed_url`), pass the include/exclude substring
/// filters and must not look like live/score/file URLs. Links back to the
/// listing itself are skipped.
pub fn extract_listing_links(source: &Source, html: &str) -> Vec<ListingLink> {
    let base_host = source
        .homepage_url
        .as_deref()
        .and_then(host_of)
        .or_else(|| host_of(&source.feed_url));
    let Some(base_host) = base_host else {
        return Vec::new();
    };
    let include = lowered(&source.include_patterns);
    let exclude = lowered(&source.exclude_patterns);
    let listing_url = normalize_url(&source.feed_url);

    let doc = Html::parse_document(html);
    let anchors = sel("a[href]");

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let url = absolute_url(href, &source.feed_url);
        if !is_http_url(&url) || url == listing_url || !seen.insert(url.clone()) {
            continue;
        }
        if host_of(&url).as_deref() != Some(base_host.as_str()) {
            continue;
        }
        if is_non_article_path(&url) {
            continue;
        }
        let lower = url.to_lowercase();
        if !include.is_empty() && !include.iter().any(|p| lower.contains(p)) {
            continue;
        }
        if exclude.iter().any(|p| lower.contains(p)) {
            continue;
        }

        out.push(ListingLink {
            url,
            anchor_text: clean_text(&a.text().collect::<Vec<_>>().join(" ")),
        });
        if out.len() >= MAX_LISTING_LINKS {
            break;
        }
    }
    out
}

fn attr_of(doc: &Html, css: &'static str, attr: &str) -> Option<String> {
    doc.select(&sel(css))
        .find_map(|el: ElementRef<'_>| el.value().attr(attr).and_then(clean_text))
}

fn meta_content(doc: &Html, css: &'static str) -> Option<String> {
    attr_of(doc, css, "content")
}

fn title_element(doc: &Html) -> Option<String> {
    doc.select(&sel("title"))
        .find_map(|t| clean_text(&t.text().collect::<String>()))
}

fn published_raw(doc: &Html) -> Option<String> {
    attr_of(doc, "time[datetime]", "datetime")
        .or_else(|| meta_content(doc, r#"meta[property="article:published_time"]"#))
        .or_else(|| meta_content(doc, r#"meta[name="publish-date"]"#))
        .or_else(|| meta_content(doc, r#"meta[name="datePublished"]"#))
}

/// Build a candidate from an article page. `None` when no title can be found.
pub fn parse_article_page(
    url: &str,
    html: &str,
    fallback_title: Option<&str>,
) -> Option<CandidateArticle> {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, r#"meta[property="og:title"]"#)
        .or_else(|| title_element(&doc))
        .or_else(|| fallback_title.and_then(clean_text))?;
    let excerpt = meta_content(&doc, r#"meta[name="description"]"#)
        .or_else(|| meta_content(&doc, r#"meta[property="og:description"]"#))
        .or_else(|| meta_content(&doc, r#"meta[name="twitter:description"]"#));
    let published_at = published_raw(&doc).as_deref().and_then(parse_published);

    Some(CandidateArticle {
        id: url.to_string(),
        title,
        link: url.to_string(),
        published_at,
        excerpt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::ParserKind;

    fn source(include: &[&str], exclude: &[&str]) -> Source {
        Source {
            id: "paddle-scotland".into(),
            name: "Paddle Scotland".into(),
            feed_url: "https://www.paddlescotland.org.uk/news/".into(),
            parser: ParserKind::Html,
            tier: 1,
            homepage_url: Some("https://www.paddlescotland.org.uk".into()),
            include_patterns: include.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: exclude.iter().map(|s| s.to_string()).collect(),
            enabled: Some(true),
            approved: Some(true),
        }
    }

    const LISTING: &str = r#"<html><body>
        <a href="/news/river-tay-descent/">River Tay <b>descent</b></a>
        <a href="/news/river-tay-descent/#comments">dup</a>
        <a href="https://www.paddlescotland.org.uk/news/Sea-Kayak-Symposium?utm_source=x">Symposium</a>
        <a href="https://elsewhere.com/news/other">Off-site</a>
        <a href="/news/live/regatta">Live</a>
        <a href="/news/poster.pdf">Poster</a>
        <a href="/about-us/">About</a>
        <a href="/news/tag/events">Tag page</a>
        <a href="mailto:info@paddlescotland.org.uk">Mail</a>
    </body></html>"#;

    #[test]
    fn listing_links_are_filtered_and_deduped() {
        let links = extract_listing_links(&source(&["/news/"], &["/tag/"]), LISTING);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.paddlescotland.org.uk/news/river-tay-descent/",
                "https://www.paddlescotland.org.uk/news/Sea-Kayak-Symposium",
            ]
        );
        assert_eq!(links[0].anchor_text.as_deref(), Some("River Tay descent"));
    }

    #[test]
    fn include_patterns_are_case_insensitive() {
        let links = extract_listing_links(&source(&["SEA-KAYAK"], &[]), LISTING);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn listing_cap_applies() {
        let mut html = String::from("<html><body>");
        for i in 0..40 {
            html.push_str(&format!(r#"<a href="/news/story-{i}">Story {i}</a>"#));
        }
        html.push_str("</body></html>");
        let links = extract_listing_links(&source(&[], &[]), &html);
        assert_eq!(links.len(), MAX_LISTING_LINKS);
    }

    #[test]
    fn article_page_prefers_og_and_time_element() {
        let html = r#"<html><head>
            <title>Site title | Paddle Scotland</title>
            <meta property="og:title" content="Sea kayak symposium returns to Skye">
            <meta property="og:description" content="OG description">
            <meta name="description" content="Three days of paddling on Skye.">
            <meta property="article:published_time" content="2025-09-01T08:00:00Z">
        </head><body><time datetime="2025-10-01T08:00:00Z">1 Oct</time></body></html>"#;
        let a = parse_article_page("https://p.scot/news/1", html, None).unwrap();
        assert_eq!(a.title, "Sea kayak symposium returns to Skye");
        assert_eq!(a.excerpt.as_deref(), Some("Three days of paddling on Skye."));
        assert_eq!(
            a.published_at.unwrap().to_rfc3339(),
            "2025-10-01T08:00:00+00:00"
        );
        assert_eq!(a.link, "https://p.scot/news/1");
    }

    #[test]
    fn article_page_fallbacks() {
        let html = r#"<html><head>
            <meta name="twitter:description" content="Twitter text">
            <meta property="article:published_time" content="2025-09-01T08:00:00Z">
        </head><body></body></html>"#;
        let a = parse_article_page("https://p.scot/news/2", html, Some("Anchor title")).unwrap();
        assert_eq!(a.title, "Anchor title");
        assert_eq!(a.excerpt.as_deref(), Some("Twitter text"));
        assert!(a.published_at.is_some());

        assert!(parse_article_page("https://p.scot/news/3", "<html></html>", None).is_none());
    }
}
