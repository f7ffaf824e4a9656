//! Polyglot Messenger - multi-conversation chat client
//!
#![doc = "Polyglot Messenger - multi-conversation chat client"]
#![doc = "Main entry point for the polyglot binary."]

use anyhow::Result;

use polyglot_messenger::cli::{Cli, Commands};
use polyglot_messenger::commands;
use polyglot_messenger::config::Config;
use polyglot_messenger::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Initialize tracing
    init_logging(&config.logging)?;

    // Execute command
    match cli.command {
        Commands::Chat { .. } => {
            // Language and transport overrides are already folded into `config`
            commands::chat::run_chat(config).await?;
            Ok(())
        }
        Commands::Languages => {
            commands::languages::list_languages();
            Ok(())
        }
    }
}
