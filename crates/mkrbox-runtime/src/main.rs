//! `mkrbox-sim`: line-oriented host for the mock simulator.
//!
//! Reads one JSON command envelope per stdin line and writes one JSON event
//! envelope per stdout line. Logs go to stderr. When stdin closes, the
//! process keeps running until the engine has no pending timers.

use std::path::PathBuf;

use clap::Parser;
use mkrbox_core::config::EngineConfig;
use mkrbox_runtime::host::serve_lines;
use mkrbox_runtime::{RuntimeError, spawn_engine};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "mkrbox-sim", about = "Mock MKRBOX factory simulator over stdin/stdout")]
struct Cli {
    /// Engine config file (.ron/.toml/.json) or a directory holding
    /// engine.* and levels.*
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not send the greeting on startup.
    #[arg(long)]
    no_connect: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, RuntimeError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let config = if path.is_dir() {
        mkrbox_data::load_config_dir(path)?
    } else {
        mkrbox_data::load_engine_config(path)?
    };
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), RuntimeError> {
    let config = load_config(cli.config.as_ref())?;
    let (handle, events) = spawn_engine(config)?;
    if !cli.no_connect {
        handle.connect()?;
    }

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    serve_lines(handle, events, input, &mut output).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Default to "warn" level if RUST_LOG is not set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        warn!(error = %e, "mkrbox-sim failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
