#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockwatch_api::server::run().await
}
