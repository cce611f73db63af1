//! Enrichment: raw table → cleaned table with the indicator battery.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error, Result};
use market::{PriceTable, indicators::add_all_features};
use tracing::{debug, info, info_span, instrument, warn};

use crate::{
    config::Config,
    layout::{file_name, list_categories, list_files},
    outcome::{CategorySummary, ItemOutcome},
};

/// Enriches every category directory found under the raw root.
#[instrument(name = "preprocess", skip_all)]
pub fn run(config: &Config) -> Vec<CategorySummary> {
    let categories = match list_categories(&config.raw_root) {
        Ok(categories) => categories,
        Err(e) => {
            warn!(error = ?e, "no raw data to preprocess");
            return Vec::new();
        }
    };

    let summaries = categories
        .iter()
        .map(|category| {
            info!(category = %category, "preprocessing category");
            preprocess_category(config, category)
        })
        .collect();

    info!("data preprocessing complete");
    summaries
}

#[instrument(skip(config))]
pub fn preprocess_category(config: &Config, category: &str) -> CategorySummary {
    let mut summary = CategorySummary::new(category);
    let input_dir = config.raw_root.join(category);
    let output_dir = config.enriched_root.join(category);

    let files = fs::create_dir_all(&output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))
        .and_then(|()| list_files(&input_dir));

    let files = match files {
        Ok(files) => files,
        Err(e) => {
            summary.record(category, ItemOutcome::Failed(format!("{e:#}")));
            summary.log();
            return summary;
        }
    };

    for input in files {
        let name = file_name(&input);
        let _span = info_span!("preprocess_file", file = %name).entered();

        let outcome: ItemOutcome = preprocess_file(&input, &output_dir.join(&name)).into();
        summary.record(&name, outcome);
    }

    summary.log();
    summary
}

/// Reads `input`, drops gapped rows, appends indicators, writes `output`.
pub fn preprocess_file(input: &Path, output: &Path) -> Result<Option<PathBuf>, Error> {
    info!("processing");

    let table = PriceTable::read_csv(input)?;
    let cleaned = table.drop_incomplete_rows();
    if cleaned.len() < table.len() {
        debug!(
            dropped = table.len() - cleaned.len(),
            kept = cleaned.len(),
            "dropped rows with missing values"
        );
    }

    let enriched = add_all_features(cleaned)?;
    enriched.write_csv(output)?;
    info!(path = %output.display(), rows = enriched.len(), "saved preprocessed data");

    Ok(Some(output.to_path_buf()))
}
