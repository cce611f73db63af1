use anyhow::{Error, Result};
use ta::Next;
use ta::indicators::{CommodityChannelIndex, MovingAverageConvergenceDivergence, RateOfChange};

use super::{
    Candle, Features, build, ema, fill, ratio, rolling_max, rolling_min, rolling_sum, series, sma,
    true_range, wilder,
};

const FAST: usize = 12;
const SLOW: usize = 26;
const SIGNAL: usize = 9;
const CCI_WINDOW: usize = 20;
const VORTEX_WINDOW: usize = 14;
const TRIX_WINDOW: usize = 15;
const MASS_FAST: usize = 9;
const MASS_SLOW: usize = 25;
const DPO_WINDOW: usize = 20;
/// (rate-of-change window, smoothing window) per KST leg, weighted 1..=4.
const KST_LEGS: [(usize, usize); 4] = [(10, 10), (15, 10), (20, 10), (30, 15)];
const KST_SIGNAL: usize = 9;
const ICHIMOKU_CONV: usize = 9;
const ICHIMOKU_BASE: usize = 26;
const ICHIMOKU_SPAN_B: usize = 52;
const STC_FAST: usize = 23;
const STC_SLOW: usize = 50;
const STC_CYCLE: usize = 10;
const STC_SMOOTH: usize = 3;
const ADX_WINDOW: usize = 14;
const AROON_WINDOW: usize = 25;
const PSAR_STEP: f64 = 0.02;
const PSAR_MAX_STEP: f64 = 0.2;

pub(crate) fn features(candles: &[Candle]) -> Result<Features, Error> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

    let mut macd_indicator = build(
        MovingAverageConvergenceDivergence::new(FAST, SLOW, SIGNAL),
        "MACD",
    )?;
    let macd_out: Vec<_> = closes.iter().map(|&x| macd_indicator.next(x)).collect();
    let macd = macd_out.iter().map(|m| m.macd).collect();
    let macd_signal = macd_out.iter().map(|m| m.signal).collect();
    let macd_diff = macd_out.iter().map(|m| m.histogram).collect();

    let sma_fast = sma(&closes, FAST)?;
    let sma_slow = sma(&closes, SLOW)?;
    let ema_fast = ema(&closes, FAST)?;
    let ema_slow = ema(&closes, SLOW)?;

    let (vortex_pos, vortex_neg) = vortex(candles);
    let vortex_diff: Vec<f64> = vortex_pos.iter().zip(&vortex_neg).map(|(p, n)| p - n).collect();

    let (kst, kst_sig) = know_sure_thing(&closes)?;
    let kst_diff: Vec<f64> = kst.iter().zip(&kst_sig).map(|(k, s)| k - s).collect();

    let ichimoku = Ichimoku::new(&highs, &lows)?;
    let visual_a = shift_forward(&ichimoku.span_a, ICHIMOKU_BASE);
    let visual_b = shift_forward(&ichimoku.span_b, ICHIMOKU_BASE);

    let adx = DirectionalMovement::new(candles);

    let mut cci_indicator = build(CommodityChannelIndex::new(CCI_WINDOW), "CCI")?;
    let cci: Vec<f64> = candles.iter().map(|c| cci_indicator.next(c)).collect();

    let (aroon_up, aroon_down) = aroon(candles);
    let aroon_ind: Vec<f64> = aroon_up.iter().zip(&aroon_down).map(|(u, d)| u - d).collect();

    let psar = ParabolicSar::new(candles);

    Ok(vec![
        ("trend_macd", fill(macd, 0.0)),
        ("trend_macd_signal", fill(macd_signal, 0.0)),
        ("trend_macd_diff", fill(macd_diff, 0.0)),
        ("trend_sma_fast", fill(sma_fast, 0.0)),
        ("trend_sma_slow", fill(sma_slow, 0.0)),
        ("trend_ema_fast", fill(ema_fast, 0.0)),
        ("trend_ema_slow", fill(ema_slow, 0.0)),
        ("trend_vortex_ind_pos", fill(vortex_pos, 0.0)),
        ("trend_vortex_ind_neg", fill(vortex_neg, 0.0)),
        ("trend_vortex_ind_diff", fill(vortex_diff, 0.0)),
        ("trend_trix", fill(trix(&closes)?, 0.0)),
        ("trend_mass_index", fill(mass_index(candles)?, 0.0)),
        ("trend_dpo", fill(detrended_price(&closes)?, 0.0)),
        ("trend_kst", fill(kst, 0.0)),
        ("trend_kst_sig", fill(kst_sig, 0.0)),
        ("trend_kst_diff", fill(kst_diff, 0.0)),
        ("trend_ichimoku_conv", fill(ichimoku.conversion, 0.0)),
        ("trend_ichimoku_base", fill(ichimoku.base, 0.0)),
        ("trend_ichimoku_a", fill(ichimoku.span_a, 0.0)),
        ("trend_ichimoku_b", fill(ichimoku.span_b, 0.0)),
        ("trend_stc", fill(schaff_trend_cycle(&closes)?, 0.0)),
        ("trend_adx", fill(adx.adx, 0.0)),
        ("trend_adx_pos", fill(adx.pos, 0.0)),
        ("trend_adx_neg", fill(adx.neg, 0.0)),
        ("trend_cci", fill(cci, 0.0)),
        ("trend_visual_ichimoku_a", fill(visual_a, 0.0)),
        ("trend_visual_ichimoku_b", fill(visual_b, 0.0)),
        ("trend_aroon_up", aroon_up),
        ("trend_aroon_down", aroon_down),
        ("trend_aroon_ind", aroon_ind),
        ("trend_psar_up", fill(psar.up, 0.0)),
        ("trend_psar_down", fill(psar.down, 0.0)),
        ("trend_psar_up_indicator", psar.up_indicator),
        ("trend_psar_down_indicator", psar.down_indicator),
    ])
}

/// Positive and negative vortex lines over a rolling window.
fn vortex(candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    let tr = rolling_sum(&true_range(candles), VORTEX_WINDOW);

    let (plus, minus): (Vec<f64>, Vec<f64>) = candles
        .iter()
        .enumerate()
        .map(|(i, c)| match i {
            0 => (0.0, 0.0),
            _ => {
                let prev = &candles[i - 1];
                ((c.high - prev.low).abs(), (c.low - prev.high).abs())
            }
        })
        .unzip();

    let pos = rolling_sum(&plus, VORTEX_WINDOW)
        .into_iter()
        .zip(&tr)
        .map(|(vm, tr)| ratio(vm, *tr))
        .collect();
    let neg = rolling_sum(&minus, VORTEX_WINDOW)
        .into_iter()
        .zip(&tr)
        .map(|(vm, tr)| ratio(vm, *tr))
        .collect();
    (pos, neg)
}

/// Percent change of a triple-smoothed EMA.
fn trix(closes: &[f64]) -> Result<Vec<f64>, Error> {
    let triple = ema(&ema(&ema(closes, TRIX_WINDOW)?, TRIX_WINDOW)?, TRIX_WINDOW)?;
    Ok((0..triple.len())
        .map(|i| match i {
            0 => f64::NAN,
            _ => ratio(triple[i] - triple[i - 1], triple[i - 1]) * 100.0,
        })
        .collect())
}

/// Rolling sum of the single/double EMA ratio of the bar range. A bar with
/// no smoothed range counts as a neutral 1.
fn mass_index(candles: &[Candle]) -> Result<Vec<f64>, Error> {
    let amplitude: Vec<f64> = candles.iter().map(|c| c.high - c.low).collect();
    let single = ema(&amplitude, MASS_FAST)?;
    let double = ema(&single, MASS_FAST)?;
    let mass = fill(
        single.iter().zip(&double).map(|(s, d)| ratio(*s, *d)).collect(),
        1.0,
    );
    Ok(rolling_sum(&mass, MASS_SLOW))
}

/// Close displaced half a window back, minus the window's mean close.
fn detrended_price(closes: &[f64]) -> Result<Vec<f64>, Error> {
    let displacement = DPO_WINDOW / 2 + 1;
    let mean = sma(closes, DPO_WINDOW)?;
    Ok((0..closes.len())
        .map(|i| match i.checked_sub(displacement) {
            Some(j) => closes[j] - mean[i],
            None => f64::NAN,
        })
        .collect())
}

/// Weighted sum of smoothed rates of change, and its signal line.
fn know_sure_thing(closes: &[f64]) -> Result<(Vec<f64>, Vec<f64>), Error> {
    let mut kst = vec![0.0; closes.len()];
    for (weight, (roc_window, sma_window)) in (1..).zip(KST_LEGS) {
        let roc = series(closes, build(RateOfChange::new(roc_window), "KST rate of change")?);
        let smoothed = sma(&fill(roc, 0.0), sma_window)?;
        for (total, leg) in kst.iter_mut().zip(smoothed) {
            *total += weight as f64 * leg;
        }
    }
    let signal = sma(&kst, KST_SIGNAL)?;
    Ok((kst, signal))
}

struct Ichimoku {
    conversion: Vec<f64>,
    base: Vec<f64>,
    span_a: Vec<f64>,
    span_b: Vec<f64>,
}

impl Ichimoku {
    fn new(highs: &[f64], lows: &[f64]) -> Result<Self, Error> {
        let conversion = midpoint(highs, lows, ICHIMOKU_CONV)?;
        let base = midpoint(highs, lows, ICHIMOKU_BASE)?;
        let span_a = conversion
            .iter()
            .zip(&base)
            .map(|(c, b)| (c + b) / 2.0)
            .collect();
        let span_b = midpoint(highs, lows, ICHIMOKU_SPAN_B)?;
        Ok(Self {
            conversion,
            base,
            span_a,
            span_b,
        })
    }
}

/// Midpoint of the rolling high and low.
fn midpoint(highs: &[f64], lows: &[f64], window: usize) -> Result<Vec<f64>, Error> {
    Ok(rolling_max(highs, window)?
        .into_iter()
        .zip(rolling_min(lows, window)?)
        .map(|(h, l)| (h + l) / 2.0)
        .collect())
}

/// Plots `values` `periods` bars ahead. The leading bars repeat the first
/// value.
fn shift_forward(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| values[i.saturating_sub(periods)])
        .collect()
}

/// MACD run through two stochastic passes, each EMA-smoothed.
fn schaff_trend_cycle(closes: &[f64]) -> Result<Vec<f64>, Error> {
    let macd: Vec<f64> = ema(closes, STC_FAST)?
        .into_iter()
        .zip(ema(closes, STC_SLOW)?)
        .map(|(fast, slow)| fast - slow)
        .collect();

    let first = ema(&stochastic(&macd, STC_CYCLE)?, STC_SMOOTH)?;
    ema(&stochastic(&first, STC_CYCLE)?, STC_SMOOTH)
}

/// Position of each value inside its rolling range, 0..=100. Flat ranges
/// read as 0.
fn stochastic(values: &[f64], window: usize) -> Result<Vec<f64>, Error> {
    let stoch = values
        .iter()
        .zip(rolling_min(values, window)?)
        .zip(rolling_max(values, window)?)
        .map(|((v, lo), hi)| ratio(v - lo, hi - lo) * 100.0)
        .collect();
    Ok(fill(stoch, 0.0))
}

/// Wilder's directional movement system.
struct DirectionalMovement {
    adx: Vec<f64>,
    pos: Vec<f64>,
    neg: Vec<f64>,
}

impl DirectionalMovement {
    fn new(candles: &[Candle]) -> Self {
        let (plus_dm, minus_dm): (Vec<f64>, Vec<f64>) = candles
            .iter()
            .enumerate()
            .map(|(i, c)| match i {
                0 => (0.0, 0.0),
                _ => {
                    let up = c.high - candles[i - 1].high;
                    let down = candles[i - 1].low - c.low;
                    (
                        if up > down && up > 0.0 { up } else { 0.0 },
                        if down > up && down > 0.0 { down } else { 0.0 },
                    )
                }
            })
            .unzip();

        let tr = wilder(&true_range(candles), ADX_WINDOW);
        let pos: Vec<f64> = fill(
            wilder(&plus_dm, ADX_WINDOW)
                .iter()
                .zip(&tr)
                .map(|(dm, tr)| ratio(*dm, *tr) * 100.0)
                .collect(),
            0.0,
        );
        let neg: Vec<f64> = fill(
            wilder(&minus_dm, ADX_WINDOW)
                .iter()
                .zip(&tr)
                .map(|(dm, tr)| ratio(*dm, *tr) * 100.0)
                .collect(),
            0.0,
        );
        let dx = fill(
            pos.iter()
                .zip(&neg)
                .map(|(p, n)| ratio((p - n).abs(), p + n) * 100.0)
                .collect(),
            0.0,
        );

        Self {
            adx: wilder(&dx, ADX_WINDOW),
            pos,
            neg,
        }
    }
}

/// Percent of the window elapsed since the latest high (up) and low (down).
fn aroon(candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    candles
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = i.saturating_sub(AROON_WINDOW);
            let window = &candles[start..=i];

            let mut since_high = 0;
            let mut since_low = 0;
            let (mut high, mut low) = (f64::MIN, f64::MAX);
            for (offset, c) in window.iter().enumerate() {
                let age = window.len() - 1 - offset;
                if c.high >= high {
                    high = c.high;
                    since_high = age;
                }
                if c.low <= low {
                    low = c.low;
                    since_low = age;
                }
            }

            let score = |age: usize| (AROON_WINDOW - age) as f64 / AROON_WINDOW as f64 * 100.0;
            (score(since_high), score(since_low))
        })
        .unzip()
}

/// Parabolic stop-and-reverse. `up` holds the stop while long and `down`
/// while short; the indicator columns flag the bar a reversal lands on.
struct ParabolicSar {
    up: Vec<f64>,
    down: Vec<f64>,
    up_indicator: Vec<f64>,
    down_indicator: Vec<f64>,
}

impl ParabolicSar {
    fn new(candles: &[Candle]) -> Self {
        let n = candles.len();
        let mut sar = Self {
            up: vec![f64::NAN; n],
            down: vec![f64::NAN; n],
            up_indicator: vec![0.0; n],
            down_indicator: vec![0.0; n],
        };
        let Some(first) = candles.first() else {
            return sar;
        };

        let mut stop: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let mut long = true;
        let mut acceleration = PSAR_STEP;
        let mut extreme_high = first.high;
        let mut extreme_low = first.low;

        for i in 2..n {
            let c = &candles[i];
            let mut reversal = false;

            if long {
                stop[i] = stop[i - 1] + acceleration * (extreme_high - stop[i - 1]);
                if c.low < stop[i] {
                    reversal = true;
                    stop[i] = extreme_high;
                    extreme_low = c.low;
                    acceleration = PSAR_STEP;
                } else {
                    if c.high > extreme_high {
                        extreme_high = c.high;
                        acceleration = (acceleration + PSAR_STEP).min(PSAR_MAX_STEP);
                    }
                    stop[i] = stop[i].min(candles[i - 1].low).min(candles[i - 2].low);
                }
            } else {
                stop[i] = stop[i - 1] - acceleration * (stop[i - 1] - extreme_low);
                if c.high > stop[i] {
                    reversal = true;
                    stop[i] = extreme_low;
                    extreme_high = c.high;
                    acceleration = PSAR_STEP;
                } else {
                    if c.low < extreme_low {
                        extreme_low = c.low;
                        acceleration = (acceleration + PSAR_STEP).min(PSAR_MAX_STEP);
                    }
                    stop[i] = stop[i].max(candles[i - 1].high).max(candles[i - 2].high);
                }
            }

            long ^= reversal;
            if long {
                sar.up[i] = stop[i];
                if reversal {
                    sar.up_indicator[i] = 1.0;
                }
            } else {
                sar.down[i] = stop[i];
                if reversal {
                    sar.down_indicator[i] = 1.0;
                }
            }
        }

        sar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::trending;

    fn column<'a>(features: &'a Features, name: &str) -> &'a [f64] {
        &features.iter().find(|(n, _)| *n == name).unwrap().1
    }

    fn bar(high: f64, low: f64) -> Candle {
        let close = (high + low) / 2.0;
        Candle { open: close, high, low, close, volume: 1.0 }
    }

    #[test]
    fn macd_is_fast_minus_slow_ema() {
        let features = features(&trending(80)).unwrap();
        let macd = column(&features, "trend_macd");
        let fast = column(&features, "trend_ema_fast");
        let slow = column(&features, "trend_ema_slow");

        for i in 0..80 {
            assert!((macd[i] - (fast[i] - slow[i])).abs() < 1e-9, "row {i}");
        }
    }

    #[test]
    fn macd_diff_is_macd_minus_signal() {
        let features = features(&trending(80)).unwrap();
        let macd = column(&features, "trend_macd");
        let signal = column(&features, "trend_macd_signal");
        let diff = column(&features, "trend_macd_diff");

        for i in 0..80 {
            assert!((diff[i] - (macd[i] - signal[i])).abs() < 1e-9, "row {i}");
        }
    }

    #[test]
    fn rising_prices_put_fast_average_above_slow() {
        let features = features(&trending(80)).unwrap();
        assert!(column(&features, "trend_sma_fast")[79] > column(&features, "trend_sma_slow")[79]);
        assert!(column(&features, "trend_macd")[79] > 0.0);
    }

    #[test]
    fn uptrend_reads_bullish_across_trend_systems() {
        let features = features(&trending(80)).unwrap();
        let last = |name| column(&features, name)[79];

        assert!(last("trend_vortex_ind_pos") > last("trend_vortex_ind_neg"));
        assert!(last("trend_vortex_ind_diff") > 0.0);
        assert!(last("trend_trix") > 0.0);
        assert!(last("trend_kst") > 0.0);
        assert!(last("trend_adx_pos") > last("trend_adx_neg"));
        assert!(last("trend_aroon_up") > last("trend_aroon_down"));
        assert!(last("trend_ichimoku_conv") > last("trend_ichimoku_b"));
        assert!(last("trend_psar_up") > 0.0);
        assert_eq!(last("trend_psar_down"), 0.0);
    }

    #[test]
    fn indicator_columns_are_binary() {
        let features = features(&trending(80)).unwrap();
        for name in ["trend_psar_up_indicator", "trend_psar_down_indicator"] {
            assert!(column(&features, name).iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }

    #[test]
    fn oscillating_trend_measures_stay_in_range() {
        let features = features(&trending(80)).unwrap();
        for name in ["trend_stc", "trend_adx", "trend_aroon_up", "trend_aroon_down"] {
            assert!(
                column(&features, name).iter().all(|v| (0.0..=100.0).contains(v)),
                "{name}"
            );
        }
    }

    #[test]
    fn aroon_counts_bars_since_extremes() {
        let mut candles: Vec<Candle> = (0..10).map(|i| bar(10.0 + i as f64, 5.0)).collect();
        candles.push(bar(12.0, 1.0));
        let (up, down) = aroon(&candles);

        assert_eq!(up[9], 100.0);
        assert!((up[10] - 96.0).abs() < 1e-9);
        assert_eq!(down[10], 100.0);
    }

    #[test]
    fn visual_ichimoku_is_shifted_forward() {
        let values: Vec<f64> = (0..30).map(f64::from).collect();
        let shifted = shift_forward(&values, ICHIMOKU_BASE);
        assert_eq!(shifted[0], 0.0);
        assert_eq!(shifted[ICHIMOKU_BASE], 0.0);
        assert_eq!(shifted[29], 3.0);
    }

    #[test]
    fn dpo_waits_for_its_displacement() {
        let closes: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let dpo = detrended_price(&closes).unwrap();
        assert!(dpo[DPO_WINDOW / 2].is_nan());
        assert!(dpo[29].is_finite());
    }

    #[test]
    fn psar_flips_short_on_a_collapse() {
        let mut candles: Vec<Candle> = (0..10).map(|i| bar(11.0 + i as f64, 9.0 + i as f64)).collect();
        candles.extend((0..5).map(|i| bar(5.0 - i as f64 * 0.5, 3.0 - i as f64 * 0.5)));
        let psar = ParabolicSar::new(&candles);

        assert!(psar.up[9].is_finite());
        assert_eq!(psar.down_indicator[10], 1.0);
        assert!(psar.down[14].is_finite());
        assert!(psar.up[14].is_nan());
    }
}
