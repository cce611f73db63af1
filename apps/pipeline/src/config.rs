use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::catalog::Catalog;

/// Everything a stage needs to know about where things live.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: Catalog,
    /// Acquisition output, enrichment input.
    pub raw_root: PathBuf,
    /// Enrichment output, analysis input.
    pub enriched_root: PathBuf,
    pub eda_root: PathBuf,
    pub history_start: NaiveDate,
    /// Columns that get a time-series plot when present.
    pub plot_columns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: Catalog::builtin(),
            raw_root: PathBuf::from("data"),
            enriched_root: PathBuf::from("processed_data"),
            eda_root: PathBuf::from("eda_plots"),
            history_start: NaiveDate::from_ymd_opt(2010, 1, 1).expect("valid date"),
            plot_columns: ["close_price", "volume", "momentum_rsi", "trend_macd"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Config {
    /// Default settings with all three roots moved under `base`.
    pub fn rooted_at(base: &Path) -> Self {
        let defaults = Self::default();
        Self {
            raw_root: base.join(&defaults.raw_root),
            enriched_root: base.join(&defaults.enriched_root),
            eda_root: base.join(&defaults.eda_root),
            ..defaults
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.raw_root, PathBuf::from("data"));
        assert_eq!(config.enriched_root, PathBuf::from("processed_data"));
        assert_eq!(config.eda_root, PathBuf::from("eda_plots"));
        assert_eq!(config.history_start.to_string(), "2010-01-01");
        assert_eq!(
            config.plot_columns,
            ["close_price", "volume", "momentum_rsi", "trend_macd"]
        );
    }

    #[test]
    fn rooted_at_moves_every_root() {
        let config = Config::rooted_at(Path::new("/tmp/run"));
        assert_eq!(config.raw_root, PathBuf::from("/tmp/run/data"));
        assert_eq!(config.enriched_root, PathBuf::from("/tmp/run/processed_data"));
        assert_eq!(config.eda_root, PathBuf::from("/tmp/run/eda_plots"));
        assert!(!config.catalog.is_empty());
    }
}
