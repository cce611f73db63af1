use pipeline::{config::Config, preprocess};
use tracing::info;

fn main() {
    pipeline::init_tracing();

    let config = Config::default();
    let summaries = preprocess::run(&config);
    let failed: usize = summaries.iter().map(|s| s.failed.len()).sum();
    info!(categories = summaries.len(), failed, "preprocess finished");
}
