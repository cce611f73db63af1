//! Acquisition: provider history → `<raw_root>/<category>/<ticker>.csv`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error, Result};
use market::{HistoryProvider, PriceTable};
use tracing::{debug, info, info_span, instrument};
use tracing_futures::Instrument;

use crate::{
    catalog::Category,
    config::Config,
    outcome::{CategorySummary, ItemOutcome},
};

/// Characters that cannot appear in a file name on common filesystems.
const ILLEGAL: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// File stem for a ticker: `=` is dropped, other illegal characters
/// become `_`.
///
/// `EURUSD=X` → `EURUSDX`, `BRK/B` → `BRK_B`.
pub fn sanitize_ticker(ticker: &str) -> String {
    ticker
        .trim()
        .chars()
        .filter(|&c| c != '=')
        .map(|c| if ILLEGAL.contains(&c) { '_' } else { c })
        .collect()
}

/// Runs acquisition for every catalog category, in catalog order.
#[instrument(name = "collect", skip_all)]
pub async fn run<P: HistoryProvider>(config: &Config, provider: &P) -> Vec<CategorySummary> {
    let mut summaries = Vec::with_capacity(config.catalog.len());

    for category in config.catalog.categories() {
        info!(
            category = %category.name,
            tickers = category.tickers.len(),
            "fetching category"
        );
        summaries.push(collect_category(config, provider, category).await);
    }

    info!("data collection complete");
    summaries
}

#[instrument(skip_all, fields(category = %category.name))]
pub async fn collect_category<P: HistoryProvider>(
    config: &Config,
    provider: &P,
    category: &Category,
) -> CategorySummary {
    let mut summary = CategorySummary::new(&category.name);
    let dir = config.raw_root.join(&category.name);

    if let Err(e) = fs::create_dir_all(&dir) {
        let reason = format!("cannot create {}: {e}", dir.display());
        for ticker in &category.tickers {
            summary.record(ticker, ItemOutcome::Failed(reason.clone()));
        }
        summary.log();
        return summary;
    }

    for ticker in &category.tickers {
        let span = info_span!("collect_symbol", symbol = %ticker);
        let outcome: ItemOutcome = collect_symbol(config, provider, &dir, ticker)
            .instrument(span)
            .await
            .into();
        summary.record(ticker, outcome);
    }

    summary.log();
    summary
}

/// `Ok(None)` when the provider had nothing for the ticker.
async fn collect_symbol<P: HistoryProvider>(
    config: &Config,
    provider: &P,
    dir: &Path,
    ticker: &str,
) -> Result<Option<PathBuf>, Error> {
    info!("fetching history");

    let bars = provider
        .fetch_history(ticker, config.history_start)
        .await
        .with_context(|| format!("error fetching data for {ticker}"))?;

    if bars.is_empty() {
        info!("no data found");
        return Ok(None);
    }
    debug!(bars = bars.len(), "fetched price bars");

    let path = dir.join(format!("{}.csv", sanitize_ticker(ticker)));
    PriceTable::from_bars(&bars).write_csv(&path)?;
    info!(path = %path.display(), rows = bars.len(), "saved");

    Ok(Some(path))
}
