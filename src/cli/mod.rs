pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Graft CLI - operator tooling for the business dashboard API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve,

    #[command(about = "Database maintenance")]
    Db {
        #[command(subcommand)]
        cmd: commands::db::DbCommands,
    },

    #[command(about = "Tenant management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Remote server checks")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve => crate::server::run().await,
        Commands::Db { cmd } => commands::db::run(cmd, format).await,
        Commands::Tenant { cmd } => commands::tenant::run(cmd, format).await,
        Commands::Server { cmd } => commands::server::run(cmd, format).await,
    }
}
