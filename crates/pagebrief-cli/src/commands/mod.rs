pub mod classify;
pub mod keys;
pub mod models;
pub mod reset_key;
pub mod summarize;
pub mod view;

use anyhow::Result;

use pagebrief_core::page::{load_document, Document};
use pagebrief_core::{AppConfig, ArticleCandidate, Classifier};

/// Load `source` and classify it once
pub async fn load_and_classify(config: &AppConfig, source: &str) -> Result<(Document, ArticleCandidate)> {
    let document = load_document(source, config.ai.request_timeout_secs).await?;
    let article = Classifier::from_config(&config.classifier).classify(&document);
    tracing::info!(
        source,
        is_article = article.is_article,
        content_chars = article.content.chars().count(),
        "Page classified"
    );
    Ok((document, article))
}
