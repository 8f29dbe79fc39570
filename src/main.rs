//! Market-data replay CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use replay_config::load_config;
use replay_monitor::setup_logging;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings from the config file, if it loads; the CLI flags win.
    let logging = load_config(&cli.config).ok().map(|config| config.logging);
    let level = cli::resolve_log_level(
        cli.log_level.as_ref(),
        logging.as_ref().map(|l| l.level.as_str()),
    );
    let json = cli.json_logs || logging.as_ref().is_some_and(|l| l.is_json());
    let file = logging.and_then(|l| l.file).map(PathBuf::from);
    let _guard = setup_logging(&level, json, file.as_deref());

    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &cli.config).await,
        Commands::Strategies => cli::commands::strategies::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
