// ABOUTME: Entry point for the commandcast CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commandcast::error::Result;
use commandcast::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);
    match cli.command {
        Commands::Exec(args) => commands::exec_command(args, cli.config, output).await,
    }
}
