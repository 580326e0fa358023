use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use pagebrief_core::presentation::FenceStripper;
use pagebrief_core::session::AttemptEventKind;
use pagebrief_core::{AppConfig, SessionController, SessionDeps, TriggerSource};

use crate::prompt::TerminalSecretPrompt;

/// Exit status after Ctrl-C, as shells report SIGINT
const EXIT_CANCELLED: i32 = 130;
const PLAIN_WIDTH: usize = 80;

pub struct SummarizeOptions {
    pub model: Option<String>,
    pub no_stream: bool,
    pub force: bool,
    pub plain: bool,
}

pub async fn run(config: &AppConfig, source: &str, options: SummarizeOptions) -> Result<()> {
    let (document, mut article) = super::load_and_classify(config, source).await?;
    if !article.is_article {
        if !options.force {
            bail!("{} does not look like an article (use --force to summarize it anyway)", source);
        }
        article = article.forced(&document);
    }

    let mut config = config.clone();
    if options.no_stream {
        config.ai.stream = false;
    }

    let deps = SessionDeps::from_config(&config, Arc::new(TerminalSecretPrompt))?;
    let mut session = SessionController::new(article, deps, &config);
    session.summarize(TriggerSource::Button, options.model.as_deref())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stdout = io::stdout();
    let mut fence = FenceStripper::default();

    while session.is_busy() {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break };
                let failure = match &event.kind {
                    AttemptEventKind::Prompting { provider } => {
                        tracing::debug!(provider = %provider, "Waiting for API key");
                        None
                    }
                    AttemptEventKind::Delta(delta) if !options.plain => {
                        stdout.write_all(fence.push(delta).as_bytes())?;
                        stdout.flush()?;
                        None
                    }
                    AttemptEventKind::Failed(error) => Some(error.user_message()),
                    _ => None,
                };
                session.handle_event(event);
                if let Some(message) = failure {
                    return Err(anyhow!(message));
                }
            }
            _ = &mut ctrl_c => {
                session.cancel();
                stdout.flush()?;
                eprintln!("\ncancelled");
                std::process::exit(EXIT_CANCELLED);
            }
        }
    }

    let summary = session
        .presentation()
        .overlay()
        .map(|overlay| overlay.content_html.clone())
        .unwrap_or_default();

    if options.plain {
        let text = html2text::from_read(summary.as_bytes(), PLAIN_WIDTH)
            .map_err(|e| anyhow!("Failed to render summary as text: {}", e))?;
        print!("{}", text);
    } else {
        println!("{}", fence.finish());
    }

    Ok(())
}
