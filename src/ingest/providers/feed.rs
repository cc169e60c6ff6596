// src/ingest/providers/feed.rs
//! RSS / Atom extraction.
//!
//! Item and entry blocks are cut out with a lightweight pattern and each
//! block is read on its own with quick-xml, so one broken item never
//! takes the rest of the feed down with it.

use anyhow::{anyhow, Result};
use metrics::histogram;
use once_cell::sync::OnceCell;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::ingest::types::CandidateArticle;
use crate::ingest::url::{is_http_url, normalize_url};
use crate::ingest::{clean_text, decode_entities, parse_published};

/// Error text recorded for payloads that are neither RSS nor Atom.
pub const UNSUPPORTED_FORMAT: &str = "Unsupported feed format";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

fn re_atom_root() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)<feed[\s>/]").unwrap())
}

fn re_rss_root() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(rss|rdf:rdf)[\s>/]").unwrap())
}

/// Root tag check. Tag names must end at whitespace, `>` or `/`, so
/// prefixed extensions like `<feedburner:info>` do not count. Atom wins
/// when both roots appear.
pub fn detect_format(xml: &str) -> Option<FeedFormat> {
    if re_atom_root().is_match(xml) {
        Some(FeedFormat::Atom)
    } else if re_rss_root().is_match(xml) {
        Some(FeedFormat::Rss)
    } else {
        None
    }
}

/// Detect the format and extract candidates. Items without a usable title
/// or link are dropped.
pub fn parse_feed(xml: &str) -> Result<Vec<CandidateArticle>> {
    let t0 = std::time::Instant::now();
    let out = match detect_format(xml) {
        Some(FeedFormat::Rss) => parse_rss(xml),
        Some(FeedFormat::Atom) => parse_atom(xml),
        None => return Err(anyhow!(UNSUPPORTED_FORMAT)),
    };
    histogram!("news_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// One direct child element of an item/entry.
#[derive(Debug, Default)]
struct Field {
    name: String,
    text: String,
    attrs: Vec<(String, String)>,
}

impl Field {
    fn from_start(e: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
        let attrs = e
            .attributes()
            .flatten()
            .map(|a| {
                (
                    String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase(),
                    decode_entities(&String::from_utf8_lossy(&a.value)),
                )
            })
            .collect();
        Self {
            name,
            text: String::new(),
            attrs,
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decoded text content, `None` when blank.
    fn value(&self) -> Option<String> {
        let v = decode_entities(&self.text);
        (!v.is_empty()).then_some(v)
    }
}

/// Read the children of one item/entry body. Nested markup (HTML inside
/// `<description>`, XHTML `<content>`) is flattened into the parent's text.
fn read_fields(inner: &str) -> Result<Vec<Field>> {
    let mut reader = Reader::from_str(inner);
    reader.config_mut().check_end_names = false;

    let mut fields = Vec::new();
    let mut current: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match current.as_mut() {
                None => current = Some(Field::from_start(&e)),
                Some(f) => f.text.push(' '),
            },
            Event::Empty(e) => {
                if current.is_none() {
                    fields.push(Field::from_start(&e));
                }
            }
            Event::Text(t) => {
                if let Some(f) = current.as_mut() {
                    f.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::CData(c) => {
                if let Some(f) = current.as_mut() {
                    f.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                match current.take() {
                    Some(f) if f.name == name => fields.push(f),
                    Some(mut f) => {
                        f.text.push(' ');
                        current = Some(f);
                    }
                    None => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(f) = current.take() {
        fields.push(f);
    }
    Ok(fields)
}

fn first_value(fields: &[Field], names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| {
        fields
            .iter()
            .filter(|f| f.name == *n)
            .find_map(Field::value)
    })
}

fn blocks<'a>(re: &Regex, xml: &'a str) -> Vec<&'a str> {
    re.captures_iter(xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

fn re_item() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<item\b[^>]*>(.*?)</item\s*>").unwrap())
}

fn re_entry() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<entry\b[^>]*>(.*?)</entry\s*>").unwrap())
}

fn finish(
    index: usize,
    prefix: &str,
    native_id: Option<String>,
    raw_link: Option<String>,
    title: Option<String>,
    published: Option<String>,
    excerpt: Option<String>,
) -> Option<CandidateArticle> {
    let link = raw_link.map(|l| normalize_url(&l)).unwrap_or_default();
    let id = native_id
        .and_then(|v| clean_text(&v))
        .or_else(|| (!link.is_empty()).then(|| link.clone()))
        .unwrap_or_else(|| format!("{prefix}-{index}"));
    let title = title.as_deref().and_then(clean_text)?;
    if !is_http_url(&link) {
        return None;
    }
    Some(CandidateArticle {
        id,
        title,
        link,
        published_at: published.as_deref().and_then(parse_published),
        excerpt: excerpt.as_deref().and_then(clean_text),
    })
}

/// RSS 2.0 / RDF items.
pub fn parse_rss(xml: &str) -> Vec<CandidateArticle> {
    let mut out = Vec::new();
    for (index, inner) in blocks(re_item(), xml).into_iter().enumerate() {
        let fields = match read_fields(inner) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(target: "ingest", error = ?e, index, "skipping malformed rss item");
                continue;
            }
        };
        let guid = first_value(&fields, &["guid"]);
        let link = first_value(&fields, &["link"])
            .or_else(|| guid.clone())
            .or_else(|| {
                fields
                    .iter()
                    .find(|f| f.name == "link")
                    .and_then(|f| f.attr("href").map(str::to_string))
            });
        let candidate = finish(
            index,
            "rss",
            guid,
            link,
            first_value(&fields, &["title"]),
            first_value(&fields, &["pubdate", "dc:date", "date"]),
            first_value(&fields, &["description", "summary", "content:encoded"]),
        );
        out.extend(candidate);
    }
    out
}

/// The first `<link>` that is `rel="alternate"` or has no `rel` at all.
fn atom_link(fields: &[Field]) -> Option<String> {
    fields
        .iter()
        .filter(|f| f.name == "link")
        .filter(|f| {
            f.attr("rel")
                .map(|r| r.eq_ignore_ascii_case("alternate"))
                .unwrap_or(true)
        })
        .find_map(|f| {
            f.attr("href")
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
}

/// Atom entries.
pub fn parse_atom(xml: &str) -> Vec<CandidateArticle> {
    let mut out = Vec::new();
    for (index, inner) in blocks(re_entry(), xml).into_iter().enumerate() {
        let fields = match read_fields(inner) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(target: "ingest", error = ?e, index, "skipping malformed atom entry");
                continue;
            }
        };
        let id = first_value(&fields, &["id"]);
        let link = atom_link(&fields).or_else(|| id.clone());
        let candidate = finish(
            index,
            "atom",
            id,
            link,
            first_value(&fields, &["title"]),
            first_value(&fields, &["published", "updated", "dc:date"]),
            first_value(&fields, &["summary", "content"]),
        );
        out.extend(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_signatures() {
        assert_eq!(detect_format("<?xml?><rss version=\"2.0\">"), Some(FeedFormat::Rss));
        assert_eq!(detect_format("<rdf:RDF>"), Some(FeedFormat::Rss));
        assert_eq!(
            detect_format("<feed xmlns=\"http://www.w3.org/2005/Atom\">"),
            Some(FeedFormat::Atom)
        );
        assert_eq!(detect_format("<html><body>nope</body></html>"), None);
        assert_eq!(detect_format("<rssfeed>"), None);
    }

    #[test]
    fn feedburner_extension_does_not_look_like_atom() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:feedburner="http://rssnamespace.org/feedburner/ext/1.0">
  <channel>
    <feedburner:info uri="wildscot" />
    <item><title>Glencoe ski day</title><link>https://a.scot/p/1</link></item>
  </channel>
</rss>"#;
        assert_eq!(detect_format(xml), Some(FeedFormat::Rss));
        assert_eq!(parse_feed(xml).unwrap().len(), 1);
    }

    #[test]
    fn unsupported_payload_is_an_error() {
        let err = parse_feed("<html></html>").unwrap_err();
        assert_eq!(err.to_string(), UNSUPPORTED_FORMAT);
    }

    #[test]
    fn rss_link_falls_back_to_guid() {
        let xml = r#"<rss><channel>
            <item><title>Glencoe ski day</title><guid>https://a.scot/p/1</guid></item>
        </channel></rss>"#;
        let items = parse_rss(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://a.scot/p/1");
        assert_eq!(items[0].id, "https://a.scot/p/1");
    }

    #[test]
    fn rss_item_without_title_is_dropped() {
        let xml = r#"<rss><channel>
            <item><link>https://a.scot/p/1</link></item>
            <item><title>Kept</title><link>https://a.scot/p/2</link></item>
        </channel></rss>"#;
        let items = parse_rss(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn rss_description_html_is_flattened() {
        let xml = r#"<rss><channel><item>
            <title>Surf &amp; sea</title>
            <link>https://a.scot/p/3?utm_source=rss</link>
            <description><![CDATA[<p>Thurso <b>surfers</b> out early</p>]]></description>
            <pubDate>Mon, 06 Oct 2025 09:00:00 +0000</pubDate>
        </item></channel></rss>"#;
        let items = parse_rss(xml);
        assert_eq!(items[0].title, "Surf & sea");
        assert_eq!(items[0].link, "https://a.scot/p/3");
        assert_eq!(items[0].excerpt.as_deref(), Some("Thurso surfers out early"));
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn atom_prefers_alternate_link_and_published() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <id>tag:a.scot,2025:1</id>
            <title type="html">Cairngorm snow report</title>
            <link rel="self" href="https://a.scot/feed/1"/>
            <link rel="alternate" href="https://a.scot/posts/1#top"/>
            <updated>2025-10-07T09:00:00Z</updated>
            <published>2025-10-06T09:00:00Z</published>
            <summary>Fresh snow on the plateau</summary>
          </entry>
          <entry>
            <id>https://a.scot/posts/2</id>
            <title>No link element</title>
          </entry>
        </feed>"#;
        let items = parse_atom(xml);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://a.scot/posts/1");
        assert_eq!(items[0].id, "tag:a.scot,2025:1");
        assert_eq!(
            items[0].published_at.unwrap().to_rfc3339(),
            "2025-10-06T09:00:00+00:00"
        );
        assert_eq!(items[1].link, "https://a.scot/posts/2");
    }
}
