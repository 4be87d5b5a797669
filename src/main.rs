use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use event_collector::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = cli::Cli::parse();
    let command = args.get_command();

    // Resolve configuration once; every command needs it
    let overrides: config::ConfigOverrides = args.overrides.into();
    let cfg = config::load_config(args.config.as_deref(), &overrides)?;

    init_tracing(&cfg.log_level, cfg.log_format);

    // Dispatch to appropriate command handler
    match command {
        cli::Commands::Serve => {
            commands::serve::execute(cfg).await?;
        }
        cli::Commands::Check => {
            commands::check::execute(&cfg);
        }
        cli::Commands::Status { url, json } => {
            commands::status::execute(&cfg, url, json).await?;
        }
    }

    Ok(())
}
