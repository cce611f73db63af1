//! Analysis driver, including a full collect → preprocess → eda run.

use std::{fs, path::Path};

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use market::{Bar, HistoryProvider};
use pipeline::{catalog::Catalog, collect, config::Config, eda, preprocess};

const PNG_MAGIC: &[u8] = b"\x89PNG";

fn write_enriched(root: &Path, category: &str, name: &str, body: &str) {
    let dir = root.join("processed_data").join(category);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

fn pngs_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".png"))
        .collect();
    names.sort();
    names
}

#[test]
fn renders_heatmap_and_plots_for_present_columns() {
    let dir = tempfile::tempdir().unwrap();
    write_enriched(
        dir.path(),
        "stocks",
        "AAPL.csv",
        "timestamp,close_price,Volume,momentum_rsi\n\
         2020-01-01,300,1000,50\n\
         2020-01-02,301,1100,55\n\
         2020-01-03,299,900,45\n",
    );
    let config = Config::rooted_at(dir.path());

    let summaries = eda::run(&config);

    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].failed.is_empty(), "{:?}", summaries[0].failed);

    let out = dir.path().join("eda_plots/stocks");
    assert_eq!(
        pngs_in(&out),
        [
            "AAPL_close_price.png",
            "AAPL_heatmap.png",
            "AAPL_momentum_rsi.png",
            "AAPL_volume.png",
        ]
    );
    let heatmap = fs::read(out.join("AAPL_heatmap.png")).unwrap();
    assert!(heatmap.starts_with(PNG_MAGIC));
}

#[test]
fn unreadable_file_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    write_enriched(dir.path(), "stocks", "BAD.csv", "close_price\n1\n");
    write_enriched(
        dir.path(),
        "stocks",
        "KO.csv",
        "timestamp,close_price\n2020-01-01,60\n2020-01-02,61\n",
    );
    let config = Config::rooted_at(dir.path());

    let summaries = eda::run(&config);
    let summary = &summaries[0];

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "BAD.csv");
    assert_eq!(
        pngs_in(&dir.path().join("eda_plots/stocks")),
        ["KO_close_price.png", "KO_heatmap.png"]
    );
}

#[test]
fn missing_enriched_root_still_creates_output_root() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::rooted_at(dir.path());

    assert!(eda::run(&config).is_empty());
    assert!(dir.path().join("eda_plots").is_dir());
}

struct Synthetic;

impl HistoryProvider for Synthetic {
    async fn fetch_history(&self, _symbol: &str, start: NaiveDate) -> Result<Vec<Bar>> {
        Ok((0..60)
            .map(|i| {
                let close = 50.0 + (i as f64 * 0.3).cos() * 3.0 + i as f64 * 0.05;
                Bar {
                    timestamp: start + Duration::days(i),
                    open: Some(close - 0.1),
                    high: Some(close + 0.8),
                    low: Some(close - 0.8),
                    close: Some(close),
                    volume: Some(5_000.0 + (i % 5) as f64 * 250.0),
                }
            })
            .collect())
    }
}

#[tokio::test]
async fn full_pipeline_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::rooted_at(dir.path())
        .with_catalog(Catalog::new().with_category("commodities", &["GC=F"]));

    collect::run(&config, &Synthetic).await;
    preprocess::run(&config);
    eda::run(&config);

    assert!(dir.path().join("data/commodities/GCF.csv").exists());
    assert!(dir.path().join("processed_data/commodities/GCF.csv").exists());
    assert_eq!(
        pngs_in(&dir.path().join("eda_plots/commodities")),
        [
            "GCF_close_price.png",
            "GCF_heatmap.png",
            "GCF_momentum_rsi.png",
            "GCF_trend_macd.png",
            "GCF_volume.png",
        ]
    );
}
