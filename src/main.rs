#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hybridbot::app::run().await
}
