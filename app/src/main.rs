#[tokio::main]
async fn main() -> anyhow::Result<()> {
    corens_lib::run().await
}
