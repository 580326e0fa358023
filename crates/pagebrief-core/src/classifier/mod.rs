//! Article detection.
//!
//! Two strategies are supported:
//! - [`HeuristicClassifier`]: OR of coarse signals, sends the raw markup.
//! - a [`ContentExtractor`]: decides readability itself and returns
//!   extracted title and prose.
//!
//! Classification never fails. Extraction errors degrade to "not an
//! article" so page initialization always completes.

mod heuristic;
mod readability;

pub use heuristic::{ArticleSignals, HeuristicClassifier};
pub use readability::{ContentExtractor, ExtractedArticle, ReadabilityExtractor};

use scraper::{ElementRef, Html, Node, Selector};

use crate::config::{ClassifierConfig, ClassifierMode};
use crate::page::Document;

/// Result of classifying one page load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleCandidate {
    pub is_article: bool,
    pub title: String,
    pub content: String,
}

impl ArticleCandidate {
    pub fn not_article() -> Self {
        Self::default()
    }

    /// Treat a page as summarizable regardless of classification
    pub fn forced(mut self, document: &Document) -> Self {
        if !self.is_article {
            self.is_article = true;
            self.content = document.html.clone();
        }
        self
    }
}

pub enum Classifier {
    Heuristic(HeuristicClassifier),
    Extractor(Box<dyn ContentExtractor>),
}

impl Classifier {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        match config.mode {
            ClassifierMode::Heuristic => Self::Heuristic(HeuristicClassifier::new(config)),
            ClassifierMode::Extractor => Self::with_extractor(Box::new(
                ReadabilityExtractor::new(config.min_readable_score),
            )),
        }
    }

    pub fn with_extractor(extractor: Box<dyn ContentExtractor>) -> Self {
        Self::Extractor(extractor)
    }

    pub fn classify(&self, document: &Document) -> ArticleCandidate {
        match self {
            Self::Heuristic(heuristic) => heuristic.classify(document),
            Self::Extractor(extractor) => classify_with_extractor(extractor.as_ref(), document),
        }
    }
}

fn classify_with_extractor(extractor: &dyn ContentExtractor, document: &Document) -> ArticleCandidate {
    if !extractor.is_readerable(document) {
        tracing::debug!("Document is not readerable");
        return ArticleCandidate::not_article();
    }

    match extractor.extract(document) {
        Ok(Some(article)) => ArticleCandidate {
            is_article: true,
            title: article.title,
            content: article.text,
        },
        Ok(None) => ArticleCandidate::not_article(),
        Err(e) => {
            tracing::warn!(error = %e, "Content extraction failed, treating page as non-article");
            ArticleCandidate::not_article()
        }
    }
}

/// Subtrees whose text is never visible
pub(crate) const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Parse a selector from a constant, None if it's invalid
pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(crate) fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    document.select(&selector).next()
}

/// Visible text under `element`, skipping script/style and similar subtrees
pub(crate) fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_visible_text(element, &mut out);
    out
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if !HIDDEN_TAGS.contains(&el.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace into single spaces
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct FailingExtractor;

    impl ContentExtractor for FailingExtractor {
        fn is_readerable(&self, _document: &Document) -> bool {
            true
        }

        fn extract(&self, _document: &Document) -> crate::Result<Option<ExtractedArticle>> {
            Err(Error::Classification("parser exploded".to_string()))
        }
    }

    struct FixedExtractor;

    impl ContentExtractor for FixedExtractor {
        fn is_readerable(&self, _document: &Document) -> bool {
            true
        }

        fn extract(&self, _document: &Document) -> crate::Result<Option<ExtractedArticle>> {
            Ok(Some(ExtractedArticle {
                title: "Title".to_string(),
                text: "Body".to_string(),
            }))
        }
    }

    #[test]
    fn test_extraction_error_degrades_to_not_article() {
        let classifier = Classifier::with_extractor(Box::new(FailingExtractor));
        let doc = Document::new(None, "<html><body><article>x</article></body></html>");
        assert_eq!(classifier.classify(&doc), ArticleCandidate::not_article());
    }

    #[test]
    fn test_extractor_output_becomes_candidate() {
        let classifier = Classifier::with_extractor(Box::new(FixedExtractor));
        let candidate = classifier.classify(&Document::new(None, "<p>x</p>"));
        assert!(candidate.is_article);
        assert_eq!(candidate.title, "Title");
        assert_eq!(candidate.content, "Body");
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let html = Html::parse_document(
            "<html><head><title>T</title></head><body><p>one two</p>\
             <script>var hidden = 1;</script><style>.x{}</style><div>three</div></body></html>",
        );
        let text = normalize_whitespace(&visible_text(html.root_element()));
        assert_eq!(text, "one two three");
    }

    #[test]
    fn test_forced_candidate_uses_raw_document() {
        let doc = Document::new(None, "<p>short</p>");
        let forced = ArticleCandidate::not_article().forced(&doc);
        assert!(forced.is_article);
        assert_eq!(forced.content, "<p>short</p>");
    }

    #[test]
    fn test_classification_leaves_document_untouched() {
        let html = "<html><body><script>x()</script><article><p>text</p></article></body></html>";
        let doc = Document::new(None, html);
        let _ = Classifier::from_config(&ClassifierConfig::default()).classify(&doc);
        assert_eq!(doc.html, html);
    }
}
