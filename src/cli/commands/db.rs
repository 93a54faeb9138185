use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::{bootstrap, DatabaseManager};

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create the shared public-schema tables if missing")]
    Init,
}

pub async fn run(cmd: DbCommands, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DbCommands::Init => init(format).await,
    }
}

async fn init(format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool()
        .await
        .context("connecting to database")?;
    bootstrap::ensure_shared_tables(&pool)
        .await
        .context("creating shared tables")?;

    match format {
        OutputFormat::Json => println!("{}", json!({ "initialized": true })),
        OutputFormat::Text => println!("Shared tables are in place"),
    }
    Ok(())
}
