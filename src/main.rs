#[tokio::main]
async fn main() -> anyhow::Result<()> {
    graft_api::server::run().await
}
