//! Command-line driver for replicated action sessions.
//!
//! Run with: `actionsim run scripts/dash_and_stun.txt`

mod commands;
mod script;

use anyhow::Result;
use clap::Parser;
use commands::{ListCatalog, RunScript};

/// Drive an authority and its replicas from a script of inputs
#[derive(Parser)]
#[command(name = "actionsim")]
#[command(about = "Replicated action session simulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Execute a session script
    Run(RunScript),

    /// List the actions a session would load
    Catalog(ListCatalog),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for RUST_LOG and ACTIONSIM_* overrides)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(cmd) => cmd.execute().await,
        Command::Catalog(cmd) => cmd.execute(),
    }
}

/// Logs go to stderr so script output on stdout stays machine-readable.
pub(crate) fn setup_logging(default_directive: Option<&str>) -> Result<()> {
    let directive: tracing_subscriber::filter::Directive = match default_directive {
        Some(raw) => raw.parse()?,
        None => tracing::Level::INFO.into(),
    };

    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(directive);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
