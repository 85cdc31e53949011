//! Chat Console - Terminal surface for a model-serving backend
//!
//! Reads lines from stdin, forwards them to a headless
//! [`Console`](console_core::Console) and prints what comes back. Replies are
//! streamed token by token when the backend supports it.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (backend at http://localhost:8000)
//! chat-console
//!
//! # Another backend, cooler sampling
//! chat-console --base-url http://gpu-box:8000 --temperature 0.2
//!
//! # With config file
//! chat-console --config ~/.config/chat-console/console.toml
//!
//! # Verbose logging (stderr)
//! RUST_LOG=debug chat-console
//! ```
//!
//! Type `/help` at the prompt for the list of commands.

mod input;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console_core::{
    config::{load_config, load_config_from_path, ConfigOverrides},
    Console, ConsoleEvent, HttpBackend, SimulatedTaskBackend,
};
use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use input::{parse_line, Command, HELP};
use render::Renderer;

/// Chat Console - Terminal chat client for a model-serving backend
#[derive(Parser, Debug)]
#[command(name = "chat-console")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "CHAT_CONSOLE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Maximum tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Nucleus sampling threshold (0.0 - 1.0)
    #[arg(long)]
    top_p: Option<f32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CHAT_CONSOLE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(url) = &self.base_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            overrides = overrides.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            overrides = overrides.with_temperature(temperature);
        }
        if let Some(top_p) = self.top_p {
            overrides = overrides.with_top_p(top_p);
        }
        overrides
    }
}

/// Initialize logging to stderr with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chat_console={level},console_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Act on one line of input
async fn handle_line<W: AsyncWrite + Unpin>(
    line: &str,
    renderer: &mut Renderer<W>,
    events: &mpsc::Sender<ConsoleEvent>,
) -> Result<()> {
    let command = parse_line(line);
    match &command {
        Command::Empty => return Ok(()),
        Command::Help => {
            renderer.line(HELP).await?;
            return Ok(());
        }
        Command::Tasks => {
            renderer.print_tasks().await?;
            return Ok(());
        }
        Command::Invalid(reason) => {
            renderer.line(&format!("[error] {reason}")).await?;
            return Ok(());
        }
        _ => {}
    }

    if command.starts_reply() {
        if !renderer.state().accepts_input() {
            renderer
                .line("[warning] still waiting for the previous reply")
                .await?;
            return Ok(());
        }
        renderer.expect_reply();
    }

    if let Some(event) = command.into_event() {
        events
            .send(event)
            .await
            .context("Console is no longer running")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line option")?;

    info!(
        source = %config.source(),
        base_url = %config.base_url,
        "Chat console starting"
    );

    let backend = HttpBackend::from_config(&config).context("Failed to create HTTP client")?;

    let (tx, mut rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(32);

    let console = Console::new(
        backend.clone(),
        backend,
        SimulatedTaskBackend::new(),
        config,
        tx,
    );
    let console_task = tokio::spawn(console.run(event_rx));

    let mut renderer = Renderer::new(tokio::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if !renderer.render(msg).await? {
                        break;
                    }
                }
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => handle_line(&line, &mut renderer, &event_tx).await?,
                None => {
                    info!("Input closed, shutting down");
                    stdin_open = false;
                    let _ = event_tx.send(ConsoleEvent::Shutdown).await;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                let _ = event_tx.send(ConsoleEvent::Shutdown).await;
            }
        }
    }

    match console_task.await? {
        Ok(()) => {
            info!("Chat console stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Console stopped with error");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_overrides_from_args() {
        let args = Args::parse_from([
            "chat-console",
            "--base-url",
            "http://gpu-box:8000",
            "--temperature",
            "0.2",
        ]);
        let overrides = args.overrides();

        assert_eq!(overrides.base_url.as_deref(), Some("http://gpu-box:8000"));
        assert_eq!(overrides.temperature, Some(0.2));
        assert_eq!(overrides.max_tokens, None);
        assert_eq!(overrides.top_p, None);
    }

    #[tokio::test]
    async fn test_chat_refused_while_reply_in_flight() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut renderer = Renderer::new(Vec::new());
        renderer
            .render(console_core::ConsoleMessage::State {
                state: console_core::ConsoleState::Ready,
            })
            .await
            .unwrap();

        handle_line("first", &mut renderer, &tx).await.unwrap();
        handle_line("second", &mut renderer, &tx).await.unwrap();
        handle_line("/clear", &mut renderer, &tx).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), ConsoleEvent::user_message("first"));
        assert_eq!(rx.try_recv().unwrap(), ConsoleEvent::ClearHistory);
        assert!(rx.try_recv().is_err());
    }
}
