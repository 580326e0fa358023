use anyhow::Result;

use pagebrief_core::classifier::HeuristicClassifier;
use pagebrief_core::config::ClassifierMode;
use pagebrief_core::AppConfig;

pub async fn run(config: &AppConfig, source: &str, mode: Option<ClassifierMode>) -> Result<()> {
    let mut config = config.clone();
    if let Some(mode) = mode {
        config.classifier.mode = mode;
    }

    let (document, article) = super::load_and_classify(&config, source).await?;

    println!("Source:  {}", source);
    println!("Mode:    {:?}", config.classifier.mode);
    println!("Article: {}", if article.is_article { "yes" } else { "no" });

    if config.classifier.mode == ClassifierMode::Heuristic {
        let signals = HeuristicClassifier::new(&config.classifier).signals(&document);
        println!("\nSignals:");
        println!("  <article> element: {}", signals.has_article_element);
        println!("  og:type article:   {}", signals.og_type_article);
        println!("  URL keyword:       {}", signals.url_keyword);
        println!(
            "  Visible words:     {} (threshold {})",
            signals.word_count, config.classifier.min_word_count
        );
    }

    if article.is_article {
        let title = if article.title.is_empty() { "(no title)" } else { article.title.as_str() };
        println!("\nTitle:   {}", title);
        println!("Content: {} chars", article.content.chars().count());
    }

    Ok(())
}
