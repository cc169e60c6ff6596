// src/classify.rs
//! Sport classifier: path/exclusion blockers, regional gate, weighted
//! keyword scoring per sport rule, general-interest fallback.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ingest::types::CandidateArticle;
use crate::ingest::url::is_non_article_path;

pub const ENV_CLASSIFIER_PATH: &str = "NEWS_CLASSIFIER_PATH";
pub const DEFAULT_CLASSIFIER_TOML: &str = include_str!("../config/classifier.toml");

/// Score per distinct primary keyword hit.
pub const PRIMARY_WEIGHT: u32 = 3;
/// Score per distinct related term hit.
pub const RELATED_WEIGHT: u32 = 1;

// Dev logging gate: NEWS_DEV_LOG=1 AND dev env (debug or SHUTTLE_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("NEWS_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

fn dev_log_classification(event: &str, title: &str, c: &Classification) {
    if !dev_logging_enabled() {
        return;
    }
    debug!(
        target: "classify",
        event,
        title,
        tags = ?c.tags,
        reasons = ?c.reasons
    );
}

/// Lowercase, `&` to "and", hyphens and other punctuation to spaces,
/// whitespace collapsed.
pub fn normalize_match_text(s: &str) -> String {
    let lower = s.to_lowercase().replace('&', " and ");
    let folded: String = lower
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierRoot {
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub region_signals: Vec<String>,
    #[serde(default)]
    pub general_keywords: Vec<String>,
    #[serde(default)]
    pub sports: Vec<SportRuleCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default = "default_general_tag")]
    pub general_tag: String,
}

fn default_max_tags() -> usize {
    2
}

fn default_general_tag() -> String {
    "general-outdoor".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportRuleCfg {
    pub id: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/* ----------------------------
Compiled structures
---------------------------- */

/// A keyword or phrase in normalized form, padded with spaces so a plain
/// `contains` on padded text is a word-boundary match.
#[derive(Debug, Clone)]
struct Phrase {
    text: String,
    padded: String,
}

impl Phrase {
    fn new(raw: &str) -> Option<Self> {
        let text = normalize_match_text(raw);
        if text.is_empty() {
            return None;
        }
        let padded = format!(" {text} ");
        Some(Self { text, padded })
    }
}

#[derive(Debug, Clone, Default)]
struct PhraseSet(Vec<Phrase>);

impl PhraseSet {
    fn compile(raw: &[String]) -> Self {
        let mut out: Vec<Phrase> = Vec::new();
        for p in raw.iter().filter_map(|r| Phrase::new(r)) {
            if !out.iter().any(|q| q.text == p.text) {
                out.push(p);
            }
        }
        Self(out)
    }

    fn first_hit(&self, padded_text: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| padded_text.contains(&p.padded))
            .map(|p| p.text.as_str())
    }

    fn count_hits(&self, padded_text: &str) -> usize {
        self.0
            .iter()
            .filter(|p| padded_text.contains(&p.padded))
            .count()
    }
}

#[derive(Debug)]
struct CompiledRule {
    id: String,
    keywords: PhraseSet,
    related: PhraseSet,
    exclude: PhraseSet,
}

/// Per-rule score, kept for ordering and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleScore {
    pub index: usize,
    pub score: u32,
    pub primary_hits: usize,
    pub related_hits: usize,
}

/// Outcome for one article. Empty `tags` means rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub tags: Vec<String>,
    pub reasons: Vec<String>,
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        !self.tags.is_empty()
    }

    fn rejected(reason: String) -> Self {
        Self {
            tags: Vec::new(),
            reasons: vec![reason],
        }
    }
}

#[derive(Debug)]
pub struct SportClassifier {
    pub cfg: ClassifierRoot,
    exclusions: PhraseSet,
    region: PhraseSet,
    general: PhraseSet,
    rules: Vec<CompiledRule>,
}

impl SportClassifier {
    /// Load from `$NEWS_CLASSIFIER_PATH`, or the built-in rule set.
    pub fn from_toml() -> anyhow::Result<Self> {
        match std::env::var(ENV_CLASSIFIER_PATH) {
            Ok(p) => Self::from_path(&PathBuf::from(p)),
            Err(_) => Self::from_toml_str(DEFAULT_CLASSIFIER_TOML),
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading classifier rules from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: ClassifierRoot = toml::from_str(toml_str).context("parsing classifier toml")?;
        if cfg.classifier.max_tags == 0 {
            anyhow::bail!("classifier.max_tags must be at least 1");
        }
        let rules = cfg
            .sports
            .iter()
            .map(|r| {
                let keywords = PhraseSet::compile(&r.keywords);
                if keywords.0.is_empty() {
                    anyhow::bail!("sport `{}` has no usable keywords", r.id);
                }
                Ok(CompiledRule {
                    id: r.id.clone(),
                    keywords,
                    related: PhraseSet::compile(&r.related),
                    exclude: PhraseSet::compile(&r.exclude),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            exclusions: PhraseSet::compile(&cfg.exclusions),
            region: PhraseSet::compile(&cfg.region_signals),
            general: PhraseSet::compile(&cfg.general_keywords),
            rules,
            cfg,
        })
    }

    /// Built-in rule set.
    pub fn builtin() -> Self {
        Self::from_toml_str(DEFAULT_CLASSIFIER_TOML).expect("built-in classifier rules")
    }

    pub fn general_tag(&self) -> &str {
        &self.cfg.classifier.general_tag
    }

    /// Sport ids in rule order, followed by the general tag.
    pub fn tag_ids(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|r| r.id.clone())
            .chain(std::iter::once(self.general_tag().to_string()))
            .collect()
    }

    /// Score every rule against already-normalized text.
    pub fn rule_scores(&self, match_text: &str) -> Vec<RuleScore> {
        let padded = format!(" {match_text} ");
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                if rule.exclude.first_hit(&padded).is_some() {
                    return RuleScore {
                        index,
                        score: 0,
                        primary_hits: 0,
                        related_hits: 0,
                    };
                }
                let primary_hits = rule.keywords.count_hits(&padded);
                let related_hits = rule.related.count_hits(&padded);
                RuleScore {
                    index,
                    score: PRIMARY_WEIGHT * primary_hits as u32
                        + RELATED_WEIGHT * related_hits as u32,
                    primary_hits,
                    related_hits,
                }
            })
            .collect()
    }

    /// Classify from raw title/excerpt/link.
    pub fn classify(&self, title: &str, excerpt: Option<&str>, link: &str) -> Classification {
        let title_text = normalize_match_text(title);
        let excerpt_text = normalize_match_text(excerpt.unwrap_or_default());
        let content = format!("{title_text} {excerpt_text}").trim().to_string();

        let verdict = self.classify_text(&content, link);
        let event = if verdict.is_accepted() {
            "accepted"
        } else {
            "rejected"
        };
        dev_log_classification(event, title, &verdict);
        verdict
    }

    pub fn classify_candidate(&self, c: &CandidateArticle) -> Classification {
        self.classify(&c.title, c.excerpt.as_deref(), &c.link)
    }

    fn classify_text(&self, content: &str, link: &str) -> Classification {
        if content.is_empty() {
            return Classification::rejected("empty_text".into());
        }
        if is_non_article_path(link) {
            return Classification::rejected("blocked:path".into());
        }
        let padded = format!(" {content} ");
        if let Some(hit) = self.exclusions.first_hit(&padded) {
            return Classification::rejected(format!("blocked:exclusion:{hit}"));
        }
        let Some(region_hit) = self.region.first_hit(&padded) else {
            return Classification::rejected("no_region_signal".into());
        };

        let mut reasons = vec![format!("region:{region_hit}")];

        let mut matched: Vec<RuleScore> = self
            .rule_scores(content)
            .into_iter()
            .filter(|s| s.primary_hits > 0 && s.score > 0)
            .collect();
        matched.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.primary_hits.cmp(&a.primary_hits))
                .then(b.related_hits.cmp(&a.related_hits))
                .then(a.index.cmp(&b.index))
        });
        matched.truncate(self.cfg.classifier.max_tags);

        if !matched.is_empty() {
            let tags = matched
                .iter()
                .map(|s| {
                    let id = self.rules[s.index].id.clone();
                    reasons.push(format!("sport:{id}:{}", s.score));
                    id
                })
                .collect();
            return Classification { tags, reasons };
        }

        if let Some(hit) = self.general.first_hit(&padded) {
            reasons.push(format!("general:{hit}"));
            return Classification {
                tags: vec![self.general_tag().to_string()],
                reasons,
            };
        }

        reasons.push("no_topic_match".into());
        Classification {
            tags: Vec::new(),
            reasons,
        }
    }
}

impl Default for SportClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal, deterministic config used only for tests.
    const TEST_TOML: &str = r#"
exclusions = ["match report"]
region_signals = ["scotland", "fort william"]
general_keywords = ["outdoor"]

[classifier]
max_tags = 2
general_tag = "general"

[[sports]]
id = "a"
keywords = ["alpha"]
related = ["near a"]

[[sports]]
id = "b"
keywords = ["beta"]
related = ["near b", "close b"]

[[sports]]
id = "c"
keywords = ["gamma", "gamma ray"]
exclude = ["gamma ray burst"]
"#;

    fn eng() -> SportClassifier {
        SportClassifier::from_toml_str(TEST_TOML).expect("load test config")
    }

    #[test]
    fn match_text_folds_punctuation() {
        assert_eq!(
            normalize_match_text("Stand-Up  Paddle & SUP: Loch-Ness!"),
            "stand up paddle and sup loch ness"
        );
    }

    #[test]
    fn phrases_need_word_boundaries() {
        let e = eng();
        assert!(!e.classify("Scotland alphabet soup", None, "https://x.scot/1").is_accepted());
        assert_eq!(
            e.classify("Scotland alpha day", None, "https://x.scot/1").tags,
            vec!["a"]
        );
        // multi-word region signal across a hyphen
        assert!(e
            .classify("Fort-William alpha", None, "https://x.scot/1")
            .is_accepted());
    }

    #[test]
    fn ordering_is_score_then_primary_then_related_then_rule_order() {
        let e = eng();
        // a: 3+1=4, b: 3+2=5, c: 3 -> b, a
        let c = e.classify(
            "Scotland alpha beta gamma",
            Some("near a, near b, close b"),
            "https://x.scot/1",
        );
        assert_eq!(c.tags, vec!["b", "a"]);

        // all tie on score 3 -> rule order, capped at two
        let c = e.classify("Scotland gamma beta alpha", None, "https://x.scot/1");
        assert_eq!(c.tags, vec!["a", "b"]);
    }

    #[test]
    fn rule_exclusion_zeroes_only_that_rule() {
        let e = eng();
        let c = e.classify("Scotland gamma ray burst seen", Some("beta"), "https://x.scot/1");
        assert_eq!(c.tags, vec!["b"]);
        let scores = e.rule_scores(&normalize_match_text("gamma ray burst"));
        assert_eq!(scores[2].score, 0);
    }

    #[test]
    fn rejections_carry_reasons() {
        let e = eng();
        let c = e.classify("Scotland alpha match report", None, "https://x.scot/1");
        assert!(!c.is_accepted());
        assert_eq!(c.reasons, vec!["blocked:exclusion:match report"]);

        let c = e.classify("Scotland alpha", None, "https://x.scot/live/1");
        assert_eq!(c.reasons, vec!["blocked:path"]);

        let c = e.classify("Alpha in Wales", None, "https://x.scot/1");
        assert_eq!(c.reasons, vec!["no_region_signal"]);

        let c = e.classify("", None, "https://x.scot/1");
        assert_eq!(c.reasons, vec!["empty_text"]);
    }

    #[test]
    fn related_only_is_not_enough() {
        let e = eng();
        assert!(!e.classify("Scotland near a", None, "https://x.scot/1").is_accepted());
        assert_eq!(
            e.classify("Scotland near a outdoor", None, "https://x.scot/1").tags,
            vec!["general"]
        );
    }

    #[test]
    fn bad_config_is_rejected() {
        assert!(SportClassifier::from_toml_str("not toml [").is_err());
        let zero = TEST_TOML.replace("max_tags = 2", "max_tags = 0");
        assert!(SportClassifier::from_toml_str(&zero).is_err());
    }

    #[test]
    fn builtin_rules_load() {
        let e = SportClassifier::builtin();
        assert_eq!(
            e.tag_ids(),
            vec![
                "surfing",
                "climbing",
                "mtb",
                "wild-swimming",
                "snowsports",
                "paddling",
                "general-outdoor"
            ]
        );
    }
}
