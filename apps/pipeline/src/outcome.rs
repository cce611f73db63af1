use std::path::PathBuf;

use anyhow::Error;
use tracing::{info, warn};

/// What happened to a single ticker or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Output written; the path of the main artifact.
    Saved(PathBuf),
    /// Nothing to write. Not a failure.
    Empty,
    Failed(String),
}

impl From<Result<Option<PathBuf>, Error>> for ItemOutcome {
    fn from(result: Result<Option<PathBuf>, Error>) -> Self {
        match result {
            Ok(Some(path)) => ItemOutcome::Saved(path),
            Ok(None) => ItemOutcome::Empty,
            // alternate form keeps the whole context chain on one line
            Err(e) => ItemOutcome::Failed(format!("{e:#}")),
        }
    }
}

/// Per-category tally a stage driver builds from its item outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: String,
    pub saved: Vec<PathBuf>,
    pub empty: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl CategorySummary {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, item: &str, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Saved(path) => self.saved.push(path),
            ItemOutcome::Empty => self.empty.push(item.to_string()),
            ItemOutcome::Failed(reason) => self.failed.push((item.to_string(), reason)),
        }
    }

    pub fn total(&self) -> usize {
        self.saved.len() + self.empty.len() + self.failed.len()
    }

    pub fn log(&self) {
        info!(
            category = %self.category,
            total = self.total(),
            saved = self.saved.len(),
            empty = self.empty.len(),
            failed = self.failed.len(),
            "category finished"
        );
        for (item, reason) in &self.failed {
            warn!(category = %self.category, item = %item, error = %reason, "item failed");
        }
    }
}
