use anyhow::Result;
use market::PriceClient;
use pipeline::{collect, config::Config};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    pipeline::init_tracing();

    let config = Config::default();
    let price_client = PriceClient::yahoo()?;

    let summaries = collect::run(&config, &price_client).await;
    let failed: usize = summaries.iter().map(|s| s.failed.len()).sum();
    info!(categories = summaries.len(), failed, "collect finished");

    Ok(())
}
