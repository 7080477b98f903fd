mod cli;
mod config;
mod logging;
mod ui;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;
use crate::config::WidgetConfig;
use crate::ui::terminal::TerminalChatApp;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the defaults and flags still apply.
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let config = WidgetConfig::from_cli(cli)?;

    logging::init(&config.log_file)?;
    tracing::info!(endpoint = %config.endpoint, "starting chat widget");

    TerminalChatApp::new(config).run().await
}
