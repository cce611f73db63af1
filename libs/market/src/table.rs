use std::path::Path;

use anyhow::{Context, Error, Result, bail, ensure};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::price_client::Bar;

pub const TIMESTAMP: &str = "timestamp";
pub const CLOSE_PRICE: &str = "close_price";
pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const VOLUME: &str = "Volume";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// A dated table of numeric columns, one row per trading day.
///
/// Cells that are empty or do not parse as numbers are held as `NaN` and
/// written back out as empty cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    timestamps: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl PriceTable {
    /// Raw layout: `timestamp,close_price,High,Low,Open,Volume`.
    pub fn from_bars(bars: &[Bar]) -> Self {
        fn pick(bars: &[Bar], field: impl Fn(&Bar) -> Option<f64>) -> Vec<f64> {
            bars.iter().map(|b| field(b).unwrap_or(f64::NAN)).collect()
        }

        let columns = vec![
            Column {
                name: CLOSE_PRICE.to_string(),
                values: pick(bars, |b| b.close),
            },
            Column {
                name: HIGH.to_string(),
                values: pick(bars, |b| b.high),
            },
            Column {
                name: LOW.to_string(),
                values: pick(bars, |b| b.low),
            },
            Column {
                name: OPEN.to_string(),
                values: pick(bars, |b| b.open),
            },
            Column {
                name: VOLUME.to_string(),
                values: pick(bars, |b| b.volume),
            },
        ];

        Self {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            columns,
        }
    }

    pub fn read_csv(path: &Path) -> Result<Self, Error> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let ts_idx = headers
            .iter()
            .position(|h| h == TIMESTAMP)
            .with_context(|| format!("missing `{TIMESTAMP}` column"))?;

        let indices: Vec<usize> = (0..headers.len()).filter(|&i| i != ts_idx).collect();
        let mut table = Self {
            timestamps: Vec::new(),
            columns: indices
                .iter()
                .map(|&i| Column {
                    name: headers[i].to_string(),
                    values: Vec::new(),
                })
                .collect(),
        };

        for (row, record) in reader.records().enumerate() {
            // header is line 1
            let line = row + 2;
            let record = record.with_context(|| format!("malformed row at line {line}"))?;

            let raw = record.get(ts_idx).unwrap_or_default();
            let date = parse_timestamp(raw)
                .with_context(|| format!("line {line}: invalid timestamp {raw:?}"))?;
            table.timestamps.push(date);

            for (column, &i) in table.columns.iter_mut().zip(&indices) {
                column.values.push(parse_number(record.get(i).unwrap_or_default()));
            }
        }

        Ok(table)
    }

    /// Overwrites `path`. Output is a pure function of the table contents.
    pub fn write_csv(&self, path: &Path) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(TIMESTAMP);
        header.extend(self.columns.iter().map(|c| c.name.as_str()));
        writer.write_record(&header)?;

        for (row, date) in self.timestamps.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(date.format(DATE_FORMAT).to_string());
            record.extend(self.columns.iter().map(|c| format_number(c.values[row])));
            writer.write_record(&record)?;
        }

        writer
            .flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDate] {
        &self.timestamps
    }

    pub fn numeric_columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Looks a column up ignoring ASCII case, so `volume` finds `Volume`.
    pub fn column_ignore_case(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn require(&self, name: &str) -> Result<&[f64], Error> {
        match self.column(name) {
            Some(values) => Ok(values),
            None => bail!("missing `{name}` column"),
        }
    }

    /// Appends a column, replacing any existing column of the same name.
    pub fn push_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), Error> {
        ensure!(
            values.len() == self.len(),
            "column `{name}` has {} values, table has {} rows",
            values.len(),
            self.len()
        );

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Copy of the table without rows that have a missing or non-finite cell.
    ///
    /// Zero is a real value here: FX and futures rows report zero volume
    /// and must survive cleaning.
    pub fn drop_incomplete_rows(&self) -> Self {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| self.columns.iter().all(|c| c.values[row].is_finite()))
            .collect();

        Self {
            timestamps: keep.iter().map(|&row| self.timestamps[row]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: keep.iter().map(|&row| c.values[row]).collect(),
                })
                .collect(),
        }
    }
}

/// Accepts a bare date, a `date time` pair or an RFC 3339 timestamp and
/// keeps only the calendar date.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDate, Error> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.date());
        }
    }
    // pandas writes tz-aware stamps as `2020-01-01 00:00:00-05:00`
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.date_naive());
    }

    bail!("unrecognised date format")
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
