// src/main.rs

use clap::Parser;

use nextdomen_sync::cli::{self, Cli};
use nextdomen_sync::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env необязателен
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    let config = AppConfig::discover(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_max_level(config.logging.tracing_level()?)
        .with_target(false)
        .init();

    cli::run(args, config).await
}
