use pipeline::{config::Config, eda};
use tracing::info;

fn main() {
    pipeline::init_tracing();

    let config = Config::default();
    let summaries = eda::run(&config);
    let failed: usize = summaries.iter().map(|s| s.failed.len()).sum();
    info!(categories = summaries.len(), failed, "eda finished");
}
