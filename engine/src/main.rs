// TermGenius report card assistant
// Main entry point for the termgenius binary

use clap::Parser;
use termgenius_engine::cli::{Cli, Command};
use termgenius_engine::config::Config;
use termgenius_engine::handlers::{
    handle_chat, handle_doctor, handle_generate, handle_inspect, handle_login, handle_logout,
    OutputFormat,
};
use termgenius_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::info!("TermGenius v{}", env!("CARGO_PKG_VERSION"));

    // Handle commands
    match cli.command {
        Command::Inspect { file } => {
            tracing::info!("Inspecting {}", file.display());
            handle_inspect(&file, format).await
        }

        Command::Chat { file } => {
            tracing::info!("Starting chat session for {}", file.display());
            handle_chat(&file, &config).await
        }

        Command::Generate { file, student } => {
            tracing::info!("Generating summaries for {}", file.display());
            handle_generate(&file, student.as_deref(), &config, format).await
        }

        Command::Login => handle_login().await,

        Command::Logout => handle_logout().await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, cli.config.clone(), format).await
        }
    }
}
