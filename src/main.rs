//! statelearner CLI entry point.

use anyhow::Result;
use clap::Parser;

use statelearner::cli::{commands, handle_error, Cli, Commands};
use statelearner::infrastructure::config::ConfigLoader;
use statelearner::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli.command, cli.config, cli.json).await {
        handle_error(&err, cli.json);
    }
}

async fn run(
    command: Commands,
    config_path: Option<std::path::PathBuf>,
    json_mode: bool,
) -> Result<()> {
    // init has to work before any config exists
    if let Commands::Init(args) = command {
        return commands::init::execute(args, json_mode).await;
    }

    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    match command {
        Commands::Init(_) => Ok(()),
        Commands::Learn(args) => commands::learn::execute(args, &config, json_mode).await,
        Commands::Results(args) => commands::results::execute(args, &config, json_mode).await,
        Commands::Query(args) => commands::query::execute(args, json_mode).await,
        Commands::Compare(args) => commands::compare::execute(args, json_mode),
    }
}
