mod advisor;
mod cli;
mod commands;
mod config;
mod confirm;
mod extract;
mod llm;
mod model;
mod ocr;
mod store;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;
    config::ensure_layout(&config)?;

    match cli.command {
        Commands::Add(args) => commands::add::run(config, args),
        Commands::Ingest(args) => commands::ingest::run(config, args),
        Commands::Import(args) => commands::import::run(config, args),
        Commands::List(args) => commands::list::run(config, args),
        Commands::Manage(args) => commands::manage::run(config, args),
        Commands::Stats(args) => commands::stats::run(config, args),
        Commands::Recipes(args) => commands::recipes::run(config, args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
