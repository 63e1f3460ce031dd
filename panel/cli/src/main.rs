//! agent-panel - Line-Oriented Chat Front-End
//!
//! Reads lines from stdin, runs each one as a turn against the agent backend
//! and prints the conversation as it changes.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (config file, PANEL_* environment)
//! agent-panel --provider openai
//!
//! # Custom socket, no streaming
//! agent-panel --socket /tmp/agent.sock --no-stream
//!
//! # Verbose logging (stderr)
//! RUST_LOG=debug agent-panel
//! ```
//!
//! # Commands
//!
//! - `/new`: Start a new conversation
//! - `/help`: List commands
//! - `/quit`: Exit (also Ctrl-D, Ctrl-C)

mod transcript;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use panel_core::{
    load_config_from_path, ConfigOverrides, ConversationStore, RenderCache, StoreChange,
    TurnController, TurnRejected, UnixSocketBackend, UserTurn,
};

use transcript::Transcript;

/// agent-panel - chat with an agent backend from the terminal
#[derive(Parser, Debug)]
#[command(name = "agent-panel")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PANEL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend Unix socket path
    #[arg(short = 's', long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Provider for new conversations
    #[arg(short = 'p', long)]
    provider: Option<String>,

    /// Model for new conversations
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Wait for whole replies instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Ask the backend for debug output
    #[arg(long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PANEL_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    /// Command-line values that override file and environment settings
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref socket) = self.socket {
            overrides = overrides.with_socket_path(socket.clone());
        }
        if let Some(ref provider) = self.provider {
            overrides = overrides.with_provider(provider.clone());
        }
        if let Some(ref model) = self.model {
            overrides = overrides.with_model(model.clone());
        }
        if self.no_stream {
            overrides = overrides.with_streaming(false);
        }
        if self.debug {
            overrides = overrides.with_debug(true);
        }
        overrides
    }
}

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Input {
    /// Blank line
    Nothing,
    /// Text to send
    Message(String),
    /// `/new`
    NewConversation,
    /// `/help`
    Help,
    /// `/quit` or `/exit`
    Quit,
    /// Unrecognized slash command
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Nothing;
        }
        match trimmed {
            "/new" => Self::NewConversation,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            cmd if cmd.starts_with('/') && !cmd.contains(char::is_whitespace) => {
                Self::Unknown(cmd.to_string())
            }
            _ => Self::Message(line.to_string()),
        }
    }
}

const HELP: &str = "Commands: /new (new conversation), /help, /quit";

/// Initialize logging on stderr so it never mixes with the transcript
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("agent_panel={level},panel_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Print store changes until the store goes away
async fn print_changes(mut changes: broadcast::Receiver<StoreChange>, mut transcript: Transcript) {
    let mut out = tokio::io::stdout();
    loop {
        match changes.recv().await {
            Ok(change) => {
                for line in transcript.on_change(&change) {
                    if write_line(&mut out, &line).await.is_err() {
                        return;
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Transcript fell behind, some updates were not printed");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

async fn write_line(out: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config =
        load_config_from_path(args.config.as_deref()).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;
    info!(source = %config.source(), "Configuration loaded");

    let backend = UnixSocketBackend::connect(&config.transport)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to backend at {}",
                config.transport.resolved_socket_path().display()
            )
        })?;
    let socket_path = backend.socket_path().to_path_buf();

    let cache = Arc::new(Mutex::new(RenderCache::with_capacity(
        config.render_cache_capacity,
    )));
    let controller = TurnController::new(Arc::new(backend), config.chat.clone())
        .with_render_cache(Arc::clone(&cache));

    let mut store = ConversationStore::new();
    let printer = tokio::spawn(print_changes(store.subscribe(), Transcript::new(cache)));

    let mut out = tokio::io::stdout();
    write_line(
        &mut out,
        &format!("Connected to {}. {HELP}", socket_path.display()),
    )
    .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match Input::parse(&line) {
            Input::Nothing => {}
            Input::Quit => break,
            Input::Help => write_line(&mut out, HELP).await?,
            Input::Unknown(cmd) => write_line(&mut out, &format!("Unknown command {cmd}. {HELP}")).await?,
            Input::NewConversation => {
                if let Err(e) = controller.new_conversation(&mut store) {
                    debug!(error = %e, "New conversation refused");
                }
            }
            Input::Message(text) => {
                tokio::select! {
                    result = controller.submit(&mut store, UserTurn::new(text)) => match result {
                        Ok(outcome) => debug!(message_id = %outcome.message_id(), completed = outcome.is_completed(), "Turn finished"),
                        Err(TurnRejected::Busy) => {}
                        Err(e) => debug!(error = %e, "Turn rejected"),
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted during a turn");
                        break;
                    }
                }
            }
        }
    }

    drop(controller);
    drop(store);
    printer.await.ok();
    info!("agent-panel stopped");
    Ok(())
}
