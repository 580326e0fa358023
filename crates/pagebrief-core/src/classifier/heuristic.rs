use regex::Regex;
use scraper::Html;

use super::{select_first, visible_text, ArticleCandidate};
use crate::config::ClassifierConfig;
use crate::page::Document;

/// Individual signals the heuristic combines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArticleSignals {
    pub has_article_element: bool,
    pub og_type_article: bool,
    pub url_keyword: bool,
    pub word_count: usize,
}

/// Coarse OR-of-signals classifier.
///
/// Any one of: an `<article>` element, `og:type = article`, a keyword in
/// the URL path, or more than `min_word_count` visible words. Long
/// non-article pages are accepted as articles.
pub struct HeuristicClassifier {
    min_word_count: usize,
    url_pattern: Option<Regex>,
}

impl HeuristicClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            min_word_count: config.min_word_count,
            url_pattern: build_url_pattern(&config.url_keywords),
        }
    }

    pub fn signals(&self, document: &Document) -> ArticleSignals {
        let parsed = Html::parse_document(&document.html);

        let og_type_article = select_first(&parsed, r#"meta[property="og:type"]"#)
            .and_then(|meta| meta.value().attr("content"))
            .map(|content| content.trim().eq_ignore_ascii_case("article"))
            .unwrap_or(false);

        let url_keyword = self
            .url_pattern
            .as_ref()
            .map(|re| re.is_match(document.path()))
            .unwrap_or(false);

        let word_count = select_first(&parsed, "body")
            .map(|body| visible_text(body).split_whitespace().count())
            .unwrap_or(0);

        ArticleSignals {
            has_article_element: select_first(&parsed, "article").is_some(),
            og_type_article,
            url_keyword,
            word_count,
        }
    }

    /// Classify without extracting: the raw markup is the summarization input
    pub fn classify(&self, document: &Document) -> ArticleCandidate {
        let signals = self.signals(document);
        let is_article = signals.has_article_element
            || signals.og_type_article
            || signals.url_keyword
            || signals.word_count > self.min_word_count;

        tracing::debug!(?signals, is_article, "Heuristic classification");

        ArticleCandidate {
            is_article,
            title: String::new(),
            content: if is_article { document.html.clone() } else { String::new() },
        }
    }
}

/// `(?i)(?:^|/)(?:news|article|...)s?(?:/|$|[-_.])`: a path segment that is a
/// keyword, its plural, or a keyword followed by a separator
fn build_url_pattern(keywords: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    let pattern = format!("(?i)(?:^|/)(?:{})s?(?:/|$|[-_.])", alternatives.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "Invalid URL keyword pattern, URL signal disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn classifier() -> HeuristicClassifier {
        HeuristicClassifier::new(&ClassifierConfig::default())
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn doc_at(url: &str, html: String) -> Document {
        Document::new(Url::parse(url).ok(), html)
    }

    #[test]
    fn test_article_element_wins_regardless_of_word_count() {
        let doc = doc_at(
            "https://example.com/",
            "<html><body><article><p>tiny</p></article></body></html>".to_string(),
        );
        let candidate = classifier().classify(&doc);
        assert!(candidate.is_article);
        assert_eq!(candidate.content, doc.html);
        assert!(candidate.title.is_empty());
    }

    #[test]
    fn test_short_plain_page_is_not_article() {
        let doc = doc_at(
            "https://example.com/about",
            format!("<html><body><div>{}</div></body></html>", words(120)),
        );
        let candidate = classifier().classify(&doc);
        assert!(!candidate.is_article);
        assert!(candidate.content.is_empty());
    }

    #[test]
    fn test_og_type_article() {
        let doc = doc_at(
            "https://example.com/",
            r#"<html><head><meta property="og:type" content="Article"></head><body>hi</body></html>"#
                .to_string(),
        );
        assert!(classifier().signals(&doc).og_type_article);
        assert!(classifier().classify(&doc).is_article);
    }

    #[test]
    fn test_url_keywords() {
        let c = classifier();
        for url in [
            "https://example.com/news/2024/01/x",
            "https://example.com/blog/posts/hello",
            "https://example.com/Story/abc",
            "https://example.com/articles",
        ] {
            let doc = doc_at(url, "<html><body>x</body></html>".to_string());
            assert!(c.signals(&doc).url_keyword, "{url}");
        }

        let doc = doc_at("https://example.com/shop/cart", "<html><body>x</body></html>".to_string());
        assert!(!c.signals(&doc).url_keyword);
    }

    #[test]
    fn test_url_keyword_must_end_its_segment() {
        let c = classifier();
        for url in [
            "https://example.com/post",
            "https://example.com/article-1",
            "https://example.com/news_today/x",
            "https://example.com/story.html",
        ] {
            let doc = doc_at(url, "<html><body>x</body></html>".to_string());
            assert!(c.signals(&doc).url_keyword, "{url}");
        }

        for url in [
            "https://example.com/postal-codes",
            "https://example.com/posters",
            "https://example.com/newsletter/signup",
            "https://example.com/storybook",
        ] {
            let doc = doc_at(url, "<html><body>x</body></html>".to_string());
            assert!(!c.signals(&doc).url_keyword, "{url}");
        }
    }

    #[test]
    fn test_long_page_counts_as_article() {
        let doc = doc_at(
            "https://example.com/pricing",
            format!("<html><body><div>{}</div></body></html>", words(501)),
        );
        assert!(classifier().classify(&doc).is_article);
    }

    #[test]
    fn test_exactly_threshold_words_is_not_enough() {
        let doc = doc_at(
            "https://example.com/pricing",
            format!("<html><body><div>{}</div></body></html>", words(500)),
        );
        assert_eq!(classifier().signals(&doc).word_count, 500);
        assert!(!classifier().classify(&doc).is_article);
    }

    #[test]
    fn test_script_words_do_not_count() {
        let doc = doc_at(
            "https://example.com/app",
            format!(
                "<html><body><div>hello</div><script>{}</script></body></html>",
                words(800)
            ),
        );
        assert_eq!(classifier().signals(&doc).word_count, 1);
    }

    #[test]
    fn test_no_keywords_disables_url_signal() {
        let config = ClassifierConfig {
            url_keywords: Vec::new(),
            ..ClassifierConfig::default()
        };
        let doc = doc_at("https://example.com/news", "<html><body>x</body></html>".to_string());
        assert!(!HeuristicClassifier::new(&config).signals(&doc).url_keyword);
    }
}
