//! Analysis: descriptive statistics, correlation heatmap and time-series
//! plots for every enriched table.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error, Result};
use market::{
    PriceTable,
    chart::{render_correlation_heatmap, render_time_series},
    stats::{correlation_matrix, describe},
};
use tracing::{debug, info, info_span, instrument, warn};

use crate::{
    config::Config,
    layout::{file_name, list_categories, list_files},
    outcome::{CategorySummary, ItemOutcome},
};

/// Analyses every category directory found under the enriched root.
#[instrument(name = "eda", skip_all)]
pub fn run(config: &Config) -> Vec<CategorySummary> {
    if let Err(e) = fs::create_dir_all(&config.eda_root) {
        warn!(error = ?e, root = %config.eda_root.display(), "cannot create EDA output root");
    }

    let categories = match list_categories(&config.enriched_root) {
        Ok(categories) => categories,
        Err(e) => {
            warn!(error = ?e, "no preprocessed data to analyse");
            return Vec::new();
        }
    };

    let summaries = categories
        .iter()
        .map(|category| {
            info!(category = %category, "starting EDA");
            analyze_category(config, category)
        })
        .collect();

    info!("EDA completed");
    summaries
}

#[instrument(skip(config))]
pub fn analyze_category(config: &Config, category: &str) -> CategorySummary {
    let mut summary = CategorySummary::new(category);
    let input_dir = config.enriched_root.join(category);
    let output_dir = config.eda_root.join(category);

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
        let _span = info_span!("eda_file", file = %name).entered();

        let outcome: ItemOutcome = analyze_file(&input, &output_dir, &config.plot_columns).into();
        summary.record(&name, outcome);
    }

    summary.log();
    summary
}

/// Image names for one input file: `<stem>_heatmap.png` and
/// `<stem>_<column>.png`.
pub fn heatmap_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}_heatmap.png"))
}

pub fn plot_path(output_dir: &Path, stem: &str, column: &str) -> PathBuf {
    output_dir.join(format!("{stem}_{column}.png"))
}

/// Logs statistics and writes the heatmap plus one plot per present
/// column. Returns the heatmap path.
pub fn analyze_file(
    input: &Path,
    output_dir: &Path,
    plot_columns: &[String],
) -> Result<Option<PathBuf>, Error> {
    info!("performing EDA");

    let table = PriceTable::read_csv(input)?;
    let name = file_name(input);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());

    info!("Descriptive Statistics for {name}:\n{}", describe(&table));

    let matrix = correlation_matrix(&table);
    let png = render_correlation_heatmap(&format!("Correlation Heatmap - {name}"), &matrix)
        .context("rendering heatmap")?;
    let heatmap = heatmap_path(output_dir, &stem);
    fs::write(&heatmap, png).with_context(|| format!("cannot write {}", heatmap.display()))?;
    info!(path = %heatmap.display(), "saved heatmap");

    let dates: Vec<String> = table
        .timestamps()
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();

    for column in plot_columns {
        let Some(series) = table.column_ignore_case(column) else {
            debug!(column = %column, "column not present, no plot");
            continue;
        };

        let png = render_time_series(
            &format!("{column} over Time - {name}"),
            column,
            &dates,
            &series.values,
        )
        .with_context(|| format!("rendering {column} plot"))?;

        let path = plot_path(output_dir, &stem, column);
        fs::write(&path, png).with_context(|| format!("cannot write {}", path.display()))?;
        info!(path = %path.display(), "saved plot");
    }

    Ok(Some(heatmap))
}
