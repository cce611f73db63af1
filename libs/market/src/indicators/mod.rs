//! Technical indicator battery.
//!
//! [`add_all_features`] appends a fixed set of volume, volatility, trend,
//! momentum and return columns to an OHLCV table. Indicators the `ta` crate
//! ships are computed with it; the rest are computed here. Window warm-up
//! and undefined values (zero ranges, zero volume) are filled with a
//! neutral default so no row is ever dropped for them.

mod momentum;
mod others;
mod trend;
mod volatility;
mod volume;

use std::fmt::Debug;

use anyhow::{Error, Result, anyhow};
use ta::Next;
use ta::indicators::{
    ExponentialMovingAverage, Maximum, Minimum, SimpleMovingAverage, TrueRange,
};

use crate::table::{CLOSE_PRICE, HIGH, LOW, OPEN, PriceTable, VOLUME};

/// One OHLCV row as the `ta` indicators see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Named output columns of one indicator group, in output order.
pub(crate) type Features = Vec<(&'static str, Vec<f64>)>;

/// Every column [`add_all_features`] appends, in order.
pub const FEATURE_COLUMNS: &[&str] = &[
    "volume_adi",
    "volume_obv",
    "volume_cmf",
    "volume_fi",
    "volume_em",
    "volume_sma_em",
    "volume_vpt",
    "volume_vwap",
    "volume_mfi",
    "volume_nvi",
    "volatility_bbm",
    "volatility_bbh",
    "volatility_bbl",
    "volatility_bbw",
    "volatility_bbp",
    "volatility_bbhi",
    "volatility_bbli",
    "volatility_kcc",
    "volatility_kch",
    "volatility_kcl",
    "volatility_kcw",
    "volatility_kcp",
    "volatility_kchi",
    "volatility_kcli",
    "volatility_dcl",
    "volatility_dch",
    "volatility_dcm",
    "volatility_dcw",
    "volatility_dcp",
    "volatility_atr",
    "volatility_ui",
    "trend_macd",
    "trend_macd_signal",
    "trend_macd_diff",
    "trend_sma_fast",
    "trend_sma_slow",
    "trend_ema_fast",
    "trend_ema_slow",
    "trend_vortex_ind_pos",
    "trend_vortex_ind_neg",
    "trend_vortex_ind_diff",
    "trend_trix",
    "trend_mass_index",
    "trend_dpo",
    "trend_kst",
    "trend_kst_sig",
    "trend_kst_diff",
    "trend_ichimoku_conv",
    "trend_ichimoku_base",
    "trend_ichimoku_a",
    "trend_ichimoku_b",
    "trend_stc",
    "trend_adx",
    "trend_adx_pos",
    "trend_adx_neg",
    "trend_cci",
    "trend_visual_ichimoku_a",
    "trend_visual_ichimoku_b",
    "trend_aroon_up",
    "trend_aroon_down",
    "trend_aroon_ind",
    "trend_psar_up",
    "trend_psar_down",
    "trend_psar_up_indicator",
    "trend_psar_down_indicator",
    "momentum_rsi",
    "momentum_stoch_rsi",
    "momentum_stoch_rsi_k",
    "momentum_stoch_rsi_d",
    "momentum_tsi",
    "momentum_uo",
    "momentum_stoch",
    "momentum_stoch_signal",
    "momentum_wr",
    "momentum_ao",
    "momentum_roc",
    "momentum_ppo",
    "momentum_ppo_signal",
    "momentum_ppo_hist",
    "momentum_pvo",
    "momentum_pvo_signal",
    "momentum_pvo_hist",
    "momentum_kama",
    "others_dr",
    "others_dlr",
    "others_cr",
];

/// Builds candles from the `Open`, `High`, `Low`, `close_price` and
/// `Volume` columns.
pub fn candles(table: &PriceTable) -> Result<Vec<Candle>, Error> {
    let open = table.require(OPEN)?;
    let high = table.require(HIGH)?;
    let low = table.require(LOW)?;
    let close = table.require(CLOSE_PRICE)?;
    let volume = table.require(VOLUME)?;

    Ok((0..table.len())
        .map(|i| Candle {
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume[i],
        })
        .collect())
}

/// Appends the full indicator battery to `table`.
///
/// The table is expected to be free of missing values already; see
/// [`PriceTable::drop_incomplete_rows`].
pub fn add_all_features(mut table: PriceTable) -> Result<PriceTable, Error> {
    let candles = candles(&table)?;

    let groups = [
        volume::features(&candles)?,
        volatility::features(&candles)?,
        trend::features(&candles)?,
        momentum::features(&candles)?,
        others::features(&candles),
    ];

    for (name, values) in groups.into_iter().flatten() {
        table.push_column(name, values)?;
    }

    Ok(table)
}

/// Unwraps a `ta` constructor result.
pub(crate) fn build<T, E: Debug>(built: std::result::Result<T, E>, name: &str) -> Result<T, Error> {
    built.map_err(|e| anyhow!("cannot build {name}: {e:?}"))
}

/// Replaces every non-finite value with `default`.
pub(crate) fn fill(values: Vec<f64>, default: f64) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| if v.is_finite() { v } else { default })
        .collect()
}

/// `num / den`, or NaN when the denominator is zero.
pub(crate) fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { f64::NAN } else { num / den }
}

/// Feeds `values` through a scalar `ta` indicator.
pub(crate) fn series<I: Next<f64, Output = f64>>(values: &[f64], mut indicator: I) -> Vec<f64> {
    values.iter().map(|&x| indicator.next(x)).collect()
}

pub(crate) fn ema(values: &[f64], window: usize) -> Result<Vec<f64>, Error> {
    Ok(series(values, build(ExponentialMovingAverage::new(window), "EMA")?))
}

/// Simple moving average, averaging fewer values until the window fills.
pub(crate) fn sma(values: &[f64], window: usize) -> Result<Vec<f64>, Error> {
    Ok(series(values, build(SimpleMovingAverage::new(window), "SMA")?))
}

pub(crate) fn rolling_max(values: &[f64], window: usize) -> Result<Vec<f64>, Error> {
    Ok(series(values, build(Maximum::new(window), "rolling max")?))
}

pub(crate) fn rolling_min(values: &[f64], window: usize) -> Result<Vec<f64>, Error> {
    Ok(series(values, build(Minimum::new(window), "rolling min")?))
}

/// Wilder smoothing: an EMA with `alpha = 1 / window`, seeded with the
/// first value.
pub(crate) fn wilder(values: &[f64], window: usize) -> Vec<f64> {
    let alpha = 1.0 / window.max(1) as f64;
    let mut out = Vec::with_capacity(values.len());
    let mut current = None;
    for &v in values {
        let next = match current {
            None => v,
            Some(prev) => prev + alpha * (v - prev),
        };
        current = Some(next);
        out.push(next);
    }
    out
}

/// True range per bar; the first bar uses its own high-low range.
pub(crate) fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = TrueRange::default();
    candles.iter().map(|c| tr.next(c)).collect()
}

/// Sum over a trailing window, shorter at the start of the series.
pub(crate) fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        out.push(sum);
    }
    out
}
