use anyhow::{Error, Result};
use ta::Next;
use ta::indicators::{
    EfficiencyRatio, FastStochastic, PercentagePriceOscillator, RateOfChange,
    RelativeStrengthIndex,
};

use super::{
    Candle, Features, build, ema, fill, ratio, rolling_max, rolling_min, rolling_sum, sma,
};

const RSI_WINDOW: usize = 14;
const STOCH_RSI_WINDOW: usize = 14;
const STOCH_RSI_SMOOTH: usize = 3;
const TSI_SLOW: usize = 25;
const TSI_FAST: usize = 13;
/// Ultimate oscillator windows, weighted 4:2:1.
const UO_WINDOWS: [(usize, f64); 3] = [(7, 4.0), (14, 2.0), (28, 1.0)];
const STOCH_WINDOW: usize = 14;
const STOCH_SIGNAL: usize = 3;
const WR_WINDOW: usize = 14;
const AO_FAST: usize = 5;
const AO_SLOW: usize = 34;
const ROC_WINDOW: usize = 12;
const PPO_FAST: usize = 12;
const PPO_SLOW: usize = 26;
const PPO_SIGNAL: usize = 9;
const KAMA_WINDOW: usize = 10;
const KAMA_FAST: f64 = 2.0;
const KAMA_SLOW: f64 = 30.0;

pub(crate) fn features(candles: &[Candle]) -> Result<Features, Error> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let mut rsi_indicator = build(RelativeStrengthIndex::new(RSI_WINDOW), "RSI")?;
    let rsi = fill(
        closes.iter().map(|&x| rsi_indicator.next(x)).collect(),
        50.0,
    );

    let stoch_rsi = fill(
        rsi.iter()
            .zip(rolling_min(&rsi, STOCH_RSI_WINDOW)?)
            .zip(rolling_max(&rsi, STOCH_RSI_WINDOW)?)
            .map(|((r, lo), hi)| ratio(r - lo, hi - lo))
            .collect(),
        0.5,
    );
    let stoch_rsi_k = sma(&stoch_rsi, STOCH_RSI_SMOOTH)?;
    let stoch_rsi_d = sma(&stoch_rsi_k, STOCH_RSI_SMOOTH)?;

    let mut stoch_indicator = build(FastStochastic::new(STOCH_WINDOW), "stochastic")?;
    let stoch = fill(
        candles.iter().map(|c| stoch_indicator.next(c)).collect(),
        50.0,
    );
    let stoch_signal = sma(&stoch, STOCH_SIGNAL)?;

    let highest = rolling_max(&candles.iter().map(|c| c.high).collect::<Vec<_>>(), WR_WINDOW)?;
    let lowest = rolling_min(&candles.iter().map(|c| c.low).collect::<Vec<_>>(), WR_WINDOW)?;
    let wr: Vec<f64> = closes
        .iter()
        .zip(highest.iter().zip(&lowest))
        .map(|(close, (hh, ll))| ratio(hh - close, hh - ll) * -100.0)
        .collect();

    let median: Vec<f64> = candles.iter().map(|c| (c.high + c.low) / 2.0).collect();
    let ao: Vec<f64> = sma(&median, AO_FAST)?
        .into_iter()
        .zip(sma(&median, AO_SLOW)?)
        .map(|(fast, slow)| fast - slow)
        .collect();

    let mut roc_indicator = build(RateOfChange::new(ROC_WINDOW), "ROC")?;
    let roc: Vec<f64> = closes.iter().map(|&x| roc_indicator.next(x)).collect();

    let mut ppo_indicator = build(
        PercentagePriceOscillator::new(PPO_FAST, PPO_SLOW, PPO_SIGNAL),
        "PPO",
    )?;
    let ppo_out: Vec<_> = closes.iter().map(|&x| ppo_indicator.next(x)).collect();
    let ppo = ppo_out.iter().map(|p| p.ppo).collect();
    let ppo_signal = ppo_out.iter().map(|p| p.signal).collect();
    let ppo_hist = ppo_out.iter().map(|p| p.histogram).collect();

    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let pvo = Oscillator::percentage(&volume)?;

    Ok(vec![
        ("momentum_rsi", rsi),
        ("momentum_stoch_rsi", stoch_rsi),
        ("momentum_stoch_rsi_k", fill(stoch_rsi_k, 0.5)),
        ("momentum_stoch_rsi_d", fill(stoch_rsi_d, 0.5)),
        ("momentum_tsi", fill(true_strength(&closes)?, 0.0)),
        ("momentum_uo", fill(ultimate_oscillator(candles), 50.0)),
        ("momentum_stoch", stoch),
        ("momentum_stoch_signal", fill(stoch_signal, 50.0)),
        ("momentum_wr", fill(wr, -50.0)),
        ("momentum_ao", fill(ao, 0.0)),
        ("momentum_roc", fill(roc, 0.0)),
        ("momentum_ppo", fill(ppo, 0.0)),
        ("momentum_ppo_signal", fill(ppo_signal, 0.0)),
        ("momentum_ppo_hist", fill(ppo_hist, 0.0)),
        ("momentum_pvo", pvo.line),
        ("momentum_pvo_signal", pvo.signal),
        ("momentum_pvo_hist", pvo.histogram),
        ("momentum_kama", kaufman_average(&closes)?),
    ])
}

/// Double-smoothed momentum over double-smoothed absolute momentum.
fn true_strength(closes: &[f64]) -> Result<Vec<f64>, Error> {
    let diff: Vec<f64> = (0..closes.len())
        .map(|i| match i {
            0 => 0.0,
            _ => closes[i] - closes[i - 1],
        })
        .collect();
    let abs: Vec<f64> = diff.iter().map(|d| d.abs()).collect();

    let smoothed = ema(&ema(&diff, TSI_SLOW)?, TSI_FAST)?;
    let smoothed_abs = ema(&ema(&abs, TSI_SLOW)?, TSI_FAST)?;
    Ok(smoothed
        .into_iter()
        .zip(smoothed_abs)
        .map(|(d, a)| ratio(d, a) * 100.0)
        .collect())
}

/// Weighted buying pressure over true range on three horizons.
fn ultimate_oscillator(candles: &[Candle]) -> Vec<f64> {
    let (pressure, range): (Vec<f64>, Vec<f64>) = candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let prev_close = if i == 0 { c.close } else { candles[i - 1].close };
            let floor = c.low.min(prev_close);
            (c.close - floor, c.high.max(prev_close) - floor)
        })
        .unzip();

    let total_weight: f64 = UO_WINDOWS.iter().map(|(_, w)| w).sum();
    let mut uo = vec![0.0; candles.len()];
    for (window, weight) in UO_WINDOWS {
        let averages = rolling_sum(&pressure, window)
            .into_iter()
            .zip(rolling_sum(&range, window))
            .map(|(bp, tr)| ratio(bp, tr));
        for (total, avg) in uo.iter_mut().zip(averages) {
            *total += weight * avg;
        }
    }
    uo.into_iter().map(|v| v / total_weight * 100.0).collect()
}

/// Adaptive average whose smoothing follows the efficiency ratio.
fn kaufman_average(closes: &[f64]) -> Result<Vec<f64>, Error> {
    let fast = 2.0 / (KAMA_FAST + 1.0);
    let slow = 2.0 / (KAMA_SLOW + 1.0);
    let mut er = build(EfficiencyRatio::new(KAMA_WINDOW), "efficiency ratio")?;

    let mut kama = Vec::with_capacity(closes.len());
    let mut level = None;
    for &close in closes {
        let efficiency = er.next(close);
        let efficiency = if efficiency.is_finite() { efficiency } else { 0.0 };
        let constant = (efficiency * (fast - slow) + slow).powi(2);

        let next = match level {
            None => close,
            Some(prev) => prev + constant * (close - prev),
        };
        level = Some(next);
        kama.push(next);
    }
    Ok(kama)
}

/// Percentage oscillator with signal and histogram. A zero slow average
/// reads as 0, so the signal EMA never sees NaN.
struct Oscillator {
    line: Vec<f64>,
    signal: Vec<f64>,
    histogram: Vec<f64>,
}

impl Oscillator {
    fn percentage(values: &[f64]) -> Result<Self, Error> {
        let line = fill(
            ema(values, PPO_FAST)?
                .into_iter()
                .zip(ema(values, PPO_SLOW)?)
                .map(|(fast, slow)| ratio(fast - slow, slow) * 100.0)
                .collect(),
            0.0,
        );
        let signal = ema(&line, PPO_SIGNAL)?;
        let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
        Ok(Self {
            line,
            signal,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::trending;

    fn column<'a>(features: &'a Features, name: &str) -> &'a [f64] {
        &features.iter().find(|(n, _)| *n == name).unwrap().1
    }

    #[test]
    fn oscillators_stay_in_their_ranges() {
        let features = features(&trending(60)).unwrap();
        for name in ["momentum_rsi", "momentum_stoch", "momentum_stoch_signal", "momentum_uo"] {
            assert!(
                column(&features, name).iter().all(|v| (0.0..=100.0).contains(v)),
                "{name}"
            );
        }
        for name in ["momentum_stoch_rsi", "momentum_stoch_rsi_k", "momentum_stoch_rsi_d"] {
            assert!(
                column(&features, name).iter().all(|v| (0.0..=1.0).contains(v)),
                "{name}"
            );
        }
        assert!(column(&features, "momentum_wr").iter().all(|v| (-100.0..=0.0).contains(v)));
        assert!(column(&features, "momentum_tsi").iter().all(|v| (-100.0..=100.0).contains(v)));
    }

    #[test]
    fn uptrend_reads_as_strong_momentum() {
        let features = features(&trending(60)).unwrap();
        let last = |name| column(&features, name)[59];

        assert!(last("momentum_rsi") > 50.0);
        assert!(last("momentum_roc") > 0.0);
        assert!(last("momentum_tsi") > 0.0);
        assert!(last("momentum_ao") > 0.0);
        assert!(last("momentum_ppo") > 0.0);
        assert!(last("momentum_kama") < 159.5 && last("momentum_kama") > 100.0);
    }

    #[test]
    fn williams_r_at_window_high_is_zero() {
        let candles: Vec<Candle> = (0..5)
            .map(|i| {
                let x = 10.0 + i as f64;
                Candle { open: x, high: x, low: x - 1.0, close: x, volume: 1.0 }
            })
            .collect();
        let features = features(&candles).unwrap();
        assert_eq!(column(&features, "momentum_wr")[4], 0.0);
    }

    #[test]
    fn histograms_are_line_minus_signal() {
        let features = features(&trending(60)).unwrap();
        for (line, signal, hist) in [
            ("momentum_ppo", "momentum_ppo_signal", "momentum_ppo_hist"),
            ("momentum_pvo", "momentum_pvo_signal", "momentum_pvo_hist"),
        ] {
            let (line, signal, hist) = (
                column(&features, line),
                column(&features, signal),
                column(&features, hist),
            );
            for i in 0..60 {
                assert!((hist[i] - (line[i] - signal[i])).abs() < 1e-9, "row {i}");
            }
        }
    }

    #[test]
    fn pvo_recovers_after_zero_volume_stretch() {
        let mut candles = trending(40);
        for c in &mut candles[..10] {
            c.volume = 0.0;
        }
        let features = features(&candles).unwrap();
        let signal = column(&features, "momentum_pvo_signal");
        assert!(signal.iter().all(|v| v.is_finite()));
        assert_ne!(signal[39], 0.0);
    }

    #[test]
    fn kama_holds_flat_prices() {
        let kama = kaufman_average(&[10.0; 20]).unwrap();
        assert!(kama.iter().all(|&v| v == 10.0));
    }
}
