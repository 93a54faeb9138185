use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Ping a running server's health endpoint")]
    Ping {
        #[arg(long, help = "Server base URL; defaults to the configured one")]
        url: Option<String>,
    },
}

pub async fn run(cmd: ServerCommands, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Ping { url } => ping(url, format).await,
    }
}

async fn ping(url: Option<String>, format: OutputFormat) -> anyhow::Result<()> {
    let base = url.unwrap_or_else(|| config().server.base_url.clone());
    let health_url = format!("{}/health", base.trim_end_matches('/'));

    let response = reqwest::get(&health_url)
        .await
        .with_context(|| format!("requesting {}", health_url))?;
    let status = response.status();
    let body: Value = response.json().await.context("parsing health response")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
        OutputFormat::Text => {
            let db_status = body["data"]["database"]["status"].as_str().unwrap_or("unknown");
            println!("{} -> HTTP {}, database {}", health_url, status.as_u16(), db_status);
        }
    }

    if !status.is_success() {
        anyhow::bail!("server reported {}", status);
    }
    Ok(())
}
