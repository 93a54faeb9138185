use clap::Parser;
use graft_api::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if let Err(e) = graft_api::cli::run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
