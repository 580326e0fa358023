use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pagebrief_core::config::ClassifierMode;
use pagebrief_core::AppConfig;

mod commands;
mod prompt;

#[derive(Parser)]
#[command(name = "pagebrief")]
#[command(author, version, about = "Detect article pages and summarize them with an AI provider")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// URL or file to open in the terminal UI (shorthand for `view`)
    source: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a page in the terminal UI
    View {
        /// URL or path of an HTML file
        source: String,
    },
    /// Summarize a page to stdout
    Summarize {
        /// URL or path of an HTML file
        source: String,
        /// Model to use instead of the configured default
        #[arg(short, long)]
        model: Option<String>,
        /// Wait for the whole response instead of streaming it
        #[arg(long)]
        no_stream: bool,
        /// Summarize even if the page does not look like an article
        #[arg(short, long)]
        force: bool,
        /// Print plain text instead of HTML
        #[arg(short, long)]
        plain: bool,
    },
    /// Show whether a page is detected as an article
    Classify {
        /// URL or path of an HTML file
        source: String,
        /// Detection strategy, overriding the config
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Prompt for a provider's API key and overwrite the stored one
    ResetKey {
        /// Provider id (openai, gemini, deepseek)
        provider: String,
    },
    /// List providers and their stored keys, masked
    Keys,
    /// List providers and their models
    Models {
        /// Save this model as the default in the config file
        #[arg(long, value_name = "MODEL")]
        set_default: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Heuristic,
    Extractor,
}

impl From<ModeArg> for ClassifierMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Heuristic => ClassifierMode::Heuristic,
            ModeArg::Extractor => ClassifierMode::Extractor,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    let command = match (cli.command, cli.source) {
        (Some(command), _) => command,
        (None, Some(source)) => Commands::View { source },
        (None, None) => {
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    // The terminal UI owns the screen, so its logs go to a file
    init_logging(&config, matches!(command, Commands::View { .. }));

    match command {
        Commands::View { source } => commands::view::run(config, &source).await,
        Commands::Summarize {
            source,
            model,
            no_stream,
            force,
            plain,
        } => {
            let options = commands::summarize::SummarizeOptions {
                model,
                no_stream,
                force,
                plain,
            };
            commands::summarize::run(&config, &source, options).await
        }
        Commands::Classify { source, mode } => {
            commands::classify::run(&config, &source, mode.map(Into::into)).await
        }
        Commands::ResetKey { provider } => commands::reset_key::run(&config, &provider).await,
        Commands::Keys => commands::keys::run(&config).await,
        Commands::Models { set_default } => commands::models::run(&config, set_default.as_deref()),
    }
}

fn init_logging(config: &AppConfig, to_file: bool) {
    let filter = || {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()))
    };

    if to_file {
        let log_path = config.log_path();
        let file = log_path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path));

        match file {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(filter())
                    .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                    .init();
                tracing::info!(path = %log_path.display(), "Logging initialized");
            }
            // No logs rather than logs drawn over the UI
            Err(_) => tracing_subscriber::registry().with(filter()).init(),
        }
        return;
    }

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
