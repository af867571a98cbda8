//! Convtree CLI
//!
//! Interactive tutoring chat that keeps a bounded conversation context.

use clap::Parser;
use convtree::commands::{self, Command, ParsedInput};
use convtree::config::{config_path, convtree_home, load_config, load_config_file};
use convtree::generator::{AnyGenerator, Generator};
use convtree::{ChatSession, ConvTreeConfig, Provider};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Convtree - chat with an AI tutor using a bounded conversation context
#[derive(Parser, Debug)]
#[command(name = "convtree")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of turns kept in the history window
    #[arg(short, long)]
    window: Option<usize>,

    /// Path to the config file (default: $CONVTREE_HOME/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text generator: echo or openai
    #[arg(long)]
    provider: Option<Provider>,

    /// Model name for the openai provider
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the Chat Completions API
    #[arg(long)]
    base_url: Option<String>,

    /// Verbose output: debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Initial question to ask
    #[arg(trailing_var_arg = true)]
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = resolve_config(&cli).await?;
    let generator = AnyGenerator::from_config(&config)?;
    info!("Using {} generator", generator.name());

    let session = ChatSession::new(generator, config.window_size);
    run(session, cli.prompt).await
}

/// Config file first, then command-line overrides
async fn resolve_config(cli: &Cli) -> anyhow::Result<ConvTreeConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path).await?,
        None => load_config(&config_path(&convtree_home()?)).await?,
    };

    if let Some(window) = cli.window {
        config = config.with_window_size(window);
    }
    if let Some(provider) = cli.provider {
        config = config.with_provider(provider);
    }
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.trim_end_matches('/'));
    }

    config.validate()?;
    Ok(config)
}

async fn run(mut session: ChatSession<AnyGenerator>, prompt: Vec<String>) -> anyhow::Result<()> {
    let (input_tx, mut input_rx) = mpsc::channel::<String>(32);

    if !prompt.is_empty() {
        input_tx.send(prompt.join(" ")).await?;
    }

    // Spawn blocking thread to read from stdin
    let stdin_tx = input_tx.clone();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if stdin_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });
    drop(input_tx);

    print_line("Type a question, or /help for commands.")?;

    while let Some(line) = input_rx.recv().await {
        match commands::parse_input(&line) {
            ParsedInput::Empty => continue,
            ParsedInput::Unknown(name) => {
                print_line(&format!("Unknown command: /{name} (try /help)"))?;
            }
            ParsedInput::Command(Command::Quit) => break,
            ParsedInput::Command(Command::Reset) => {
                session.reset();
                print_line(&commands::render(Command::Reset, session.tree())?)?;
            }
            ParsedInput::Command(command) => {
                print_line(&commands::render(command, session.tree())?)?;
            }
            ParsedInput::Message(message) => match session.ask(&message).await {
                Ok(response) => {
                    print_line(&response)?;
                    print_line(&format!("[{}]", session.usage()))?;
                }
                Err(e) => error!("Generation failed: {}", e),
            },
        }
    }

    Ok(())
}

fn print_line(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()
}
