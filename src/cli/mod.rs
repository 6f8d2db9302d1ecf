//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod provider_list;
pub mod say;
pub mod search;

#[cfg(test)]
mod tests;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::chat::run_chat;
use crate::cli::provider_list::list_providers;
use crate::cli::say::run_say;
use crate::cli::search::run_search;
use crate::core::chat_stream::StreamMessage;
use crate::core::config::Config;
use crate::core::gateway::ChatGateway;
use crate::core::search::SearchProvider;
use crate::core::session::{SessionId, SessionManager};
use crate::utils::logging::TranscriptLog;

/// Environment variable holding the `tracing` filter directives.
pub const LOG_FILTER_ENV: &str = "CHATGATE_LOG";

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "chatgate")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Stream chat completions from OpenAI, Anthropic and Gemini style APIs")]
#[command(
    long_about = "chatgate streams chat completions from OpenAI-compatible, Anthropic and Gemini \
backends, optionally letting the model ask for a web search first.\n\n\
Configuration:\n\
  Providers and search backends are read from config.toml in the platform config directory,\n\
  or from the file given with --config.\n\n\
Environment Variables (fallback if no provider is configured):\n\
  OPENAI_API_KEY      Your OpenAI API key\n\
  OPENAI_BASE_URL     Custom API base URL (optional, defaults to https://api.openai.com/v1)\n\
  CHATGATE_LOG        Diagnostic log filter for stderr (defaults to warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Options shared by the commands that run chat turns.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct TurnArgs {
    /// Model to use instead of the provider's configured model
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Let the model request a web search before answering
    #[arg(long, overrides_with = "no_search")]
    pub search: bool,

    /// Never search, even if search is enabled in the config
    #[arg(long = "no-search", overrides_with = "search")]
    pub no_search: bool,

    /// Append the transcript to this file
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

impl TurnArgs {
    /// The command line wins over the config's `search.enabled`.
    pub fn search_enabled(&self, config: &Config) -> bool {
        if self.search {
            true
        } else if self.no_search {
            false
        } else {
            config.search.enabled
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one prompt and print the answer
    Say {
        /// Provider to use; repeat to ask several providers concurrently
        #[arg(short = 'p', long = "provider", value_name = "PROVIDER")]
        providers: Vec<String>,

        #[command(flatten)]
        turn: TurnArgs,

        /// The prompt
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Start an interactive chat (default)
    Chat {
        /// Provider to use
        #[arg(short = 'p', long, value_name = "PROVIDER")]
        provider: Option<String>,

        #[command(flatten)]
        turn: TurnArgs,
    },
    /// Query the configured search backend directly
    Search {
        /// The search query
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
    /// List configured providers
    Providers,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn Error>> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.config.as_ref())?;

    match args.command.unwrap_or(Commands::Chat {
        provider: None,
        turn: TurnArgs::default(),
    }) {
        Commands::Say {
            providers,
            turn,
            prompt,
        } => run_say(&config, providers, turn, prompt.join(" ")).await,
        Commands::Chat { provider, turn } => run_chat(&config, provider, turn).await,
        Commands::Search { query } => run_search(&config, &query.join(" ")).await,
        Commands::Providers => {
            list_providers(&config);
            Ok(())
        }
    }
}

/// Builds the gateway for a CLI run, with search attached only when the turn wants it.
pub(crate) fn build_gateway(
    config: &Config,
    sessions: SessionManager,
    search: bool,
) -> (
    ChatGateway,
    tokio::sync::mpsc::UnboundedReceiver<(StreamMessage, SessionId)>,
) {
    let client = reqwest::Client::new();
    let (gateway, rx) = ChatGateway::new(client.clone(), sessions);
    let mut gateway = gateway.with_idle_timeout(config.idle_timeout());
    if search {
        match config.search_backend() {
            Some(backend) => {
                gateway = gateway.with_search(
                    SearchProvider::new(client, backend.clone()),
                    config.search_limits(),
                );
            }
            None => warn!("Search requested but no search backend is configured"),
        }
    }
    (gateway, rx)
}

pub(crate) fn open_transcript(
    turn: &TurnArgs,
    header: &str,
) -> Result<TranscriptLog, Box<dyn Error>> {
    match &turn.log {
        Some(path) => TranscriptLog::open(path, header).map_err(|err| {
            format!("Failed to open log file {}: {err}", path.display()).into()
        }),
        None => Ok(TranscriptLog::disabled()),
    }
}
