use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use super::{normalize_whitespace, select_first, selector, visible_text, HIDDEN_TAGS};
use crate::page::Document;
use crate::{Error, Result};

/// Extracted title and plain-text body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: String,
    pub text: String,
}

/// Injected content-extraction capability.
///
/// The extractor owns the "probably readable" decision; the classifier
/// only composes the two calls.
pub trait ContentExtractor: Send + Sync {
    fn is_readerable(&self, document: &Document) -> bool;

    /// `Ok(None)` when the page has no extractable article body
    fn extract(&self, document: &Document) -> Result<Option<ExtractedArticle>>;
}

/// Minimum node text length considered by the readability score
const MIN_NODE_LENGTH: usize = 140;

/// Extracted bodies shorter than this are not articles
const MIN_ARTICLE_CHARS: usize = 250;

/// Containers tried in order when looking for the main content
const CONTENT_CONTAINERS: &[&str] = &["article", "main", "[role='main']", "#content", ".content"];

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre",
];

/// Chrome whose text never belongs to the article body
const CHROME_TAGS: &[&str] = &["nav", "aside", "footer", "form"];

fn unlikely_candidates() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            "(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|\
             footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|\
             skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote",
        )
        .ok()
    })
    .as_ref()
}

fn maybe_candidate() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new("(?i)and|article|body|column|content|main|shadow").ok())
        .as_ref()
}

/// Readability-style extractor built on `scraper`
pub struct ReadabilityExtractor {
    min_score: f64,
}

impl Default for ReadabilityExtractor {
    fn default() -> Self {
        Self::new(20.0)
    }
}

impl ReadabilityExtractor {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    /// Sum of `sqrt(len - 140)` over long, visible, likely paragraphs
    pub fn readability_score(&self, document: &Document) -> f64 {
        let parsed = Html::parse_document(&document.html);
        let Some(nodes) = selector("p, pre, article") else {
            return 0.0;
        };

        let mut score = 0.0;
        for node in parsed.select(&nodes) {
            if !is_probably_visible(node) || looks_unlikely(node) || is_inside(node, &["li"]) {
                continue;
            }

            let length = normalize_whitespace(&visible_text(node)).chars().count();
            if length < MIN_NODE_LENGTH {
                continue;
            }

            score += ((length - MIN_NODE_LENGTH) as f64).sqrt();
            if score > self.min_score {
                break;
            }
        }
        score
    }
}

impl ContentExtractor for ReadabilityExtractor {
    fn is_readerable(&self, document: &Document) -> bool {
        self.readability_score(document) > self.min_score
    }

    fn extract(&self, document: &Document) -> Result<Option<ExtractedArticle>> {
        if document.html.trim().is_empty() {
            return Err(Error::Classification("empty document".to_string()));
        }

        let parsed = Html::parse_document(&document.html);
        let title = extract_title(&parsed);
        let text = extract_text(&parsed);

        if text.chars().count() < MIN_ARTICLE_CHARS {
            return Ok(None);
        }

        Ok(Some(ExtractedArticle { title, text }))
    }
}

/// og:title, then <title>, then the first <h1>
fn extract_title(parsed: &Html) -> String {
    if let Some(content) = select_first(parsed, r#"meta[property="og:title"]"#)
        .and_then(|meta| meta.value().attr("content"))
    {
        let title = normalize_whitespace(content);
        if !title.is_empty() {
            return title;
        }
    }

    for css in ["title", "h1"] {
        if let Some(element) = select_first(parsed, css) {
            let title = normalize_whitespace(&element.text().collect::<String>());
            if !title.is_empty() {
                return title;
            }
        }
    }

    String::new()
}

fn extract_text(parsed: &Html) -> String {
    for css in CONTENT_CONTAINERS {
        if let Some(container) = select_first(parsed, css) {
            let text = block_text(container);
            if !text.is_empty() {
                return text;
            }
        }
    }

    select_first(parsed, "body")
        .map(block_text)
        .unwrap_or_default()
}

/// Text of top-level block elements under `root`, one paragraph each
fn block_text(root: ElementRef<'_>) -> String {
    let Some(blocks) = selector(&BLOCK_TAGS.join(", ")) else {
        return String::new();
    };

    let mut paragraphs: Vec<String> = Vec::new();
    for block in root.select(&blocks) {
        if is_inside(block, BLOCK_TAGS) || is_inside(block, CHROME_TAGS) || is_inside(block, HIDDEN_TAGS) {
            continue;
        }
        if !is_probably_visible(block) {
            continue;
        }

        let text = normalize_whitespace(&visible_text(block));
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }

    paragraphs.join("\n\n")
}

/// Whether any ancestor of `element` is one of `tags`
fn is_inside(element: ElementRef<'_>, tags: &[&str]) -> bool {
    element
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|el| tags.contains(&el.name()))
}

fn looks_unlikely(element: ElementRef<'_>) -> bool {
    let value = element.value();
    let match_string = format!(
        "{} {}",
        value.attr("class").unwrap_or_default(),
        value.id().unwrap_or_default()
    );

    let unlikely = unlikely_candidates()
        .map(|re| re.is_match(&match_string))
        .unwrap_or(false);
    let maybe = maybe_candidate()
        .map(|re| re.is_match(&match_string))
        .unwrap_or(false);

    unlikely && !maybe
}

fn is_probably_visible(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
        return false;
    }
    let style = value
        .attr("style")
        .unwrap_or_default()
        .replace(' ', "")
        .to_ascii_lowercase();
    !style.contains("display:none") && !style.contains("visibility:hidden")
}
