//! flatcartag entry point.

use anyhow::Result;
use clap::Parser;

use flatcartag::cli::commands::{config as config_cmd, nodes, run};
use flatcartag::cli::{Cli, Commands};
use flatcartag::infrastructure::config::ConfigLoader;
use flatcartag::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = dispatch(cli).await {
        flatcartag::cli::handle_error(err, json_mode);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let overrides = cli.overrides();
    let config = ConfigLoader::load(cli.config.as_deref(), overrides)?;
    let _logger = LoggerImpl::init(&config.logging)?;

    match cli.command.unwrap_or_default() {
        Commands::Run(_) => run::execute(config).await,
        Commands::Nodes(args) => nodes::execute(args, &config, cli.json).await,
        Commands::Config => config_cmd::execute(&config, cli.json),
    }
}
