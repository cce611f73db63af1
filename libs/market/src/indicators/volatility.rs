use anyhow::{Error, Result};
use ta::Next;
use ta::indicators::{AverageTrueRange, BollingerBands, KeltnerChannel, Maximum, Minimum};

use super::{Candle, Features, build, fill, ratio, rolling_max, sma};

const BB_WINDOW: usize = 20;
const BB_DEVIATIONS: f64 = 2.0;
const KC_WINDOW: usize = 10;
const KC_MULTIPLIER: f64 = 2.0;
const DC_WINDOW: usize = 20;
const ATR_WINDOW: usize = 14;
const UI_WINDOW: usize = 14;

pub(crate) fn features(candles: &[Candle]) -> Result<Features, Error> {
    let mut bb = build(BollingerBands::new(BB_WINDOW, BB_DEVIATIONS), "Bollinger bands")?;
    let bands: Vec<_> = candles.iter().map(|c| (c.close, bb.next(c.close))).collect();

    let bbm = bands.iter().map(|(_, b)| b.average).collect();
    let bbh = bands.iter().map(|(_, b)| b.upper).collect();
    let bbl = bands.iter().map(|(_, b)| b.lower).collect();
    let bbw = bands
        .iter()
        .map(|(_, b)| ratio(b.upper - b.lower, b.average) * 100.0)
        .collect();
    let bbp = bands
        .iter()
        .map(|(close, b)| ratio(close - b.lower, b.upper - b.lower))
        .collect();
    let bbhi: Vec<f64> = bands
        .iter()
        .map(|(close, b)| if *close > b.upper { 1.0 } else { 0.0 })
        .collect();
    let bbli: Vec<f64> = bands
        .iter()
        .map(|(close, b)| if *close < b.lower { 1.0 } else { 0.0 })
        .collect();

    let mut kc = build(KeltnerChannel::new(KC_WINDOW, KC_MULTIPLIER), "Keltner channel")?;
    let channel: Vec<_> = candles.iter().map(|c| (c.close, kc.next(c))).collect();
    let kcc = channel.iter().map(|(_, k)| k.average).collect();
    let kch = channel.iter().map(|(_, k)| k.upper).collect();
    let kcl = channel.iter().map(|(_, k)| k.lower).collect();
    let kcw = channel
        .iter()
        .map(|(_, k)| ratio(k.upper - k.lower, k.average) * 100.0)
        .collect();
    let kcp = channel
        .iter()
        .map(|(close, k)| ratio(close - k.lower, k.upper - k.lower))
        .collect();
    let kchi: Vec<f64> = channel
        .iter()
        .map(|(close, k)| if *close > k.upper { 1.0 } else { 0.0 })
        .collect();
    let kcli: Vec<f64> = channel
        .iter()
        .map(|(close, k)| if *close < k.lower { 1.0 } else { 0.0 })
        .collect();

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let mut highest = build(Maximum::new(DC_WINDOW), "Donchian high")?;
    let mut lowest = build(Minimum::new(DC_WINDOW), "Donchian low")?;
    let dch: Vec<f64> = candles.iter().map(|c| highest.next(c.high)).collect();
    let dcl: Vec<f64> = candles.iter().map(|c| lowest.next(c.low)).collect();
    let dcm: Vec<f64> = dch.iter().zip(&dcl).map(|(h, l)| (h + l) / 2.0).collect();
    let dcw = dch
        .iter()
        .zip(&dcl)
        .zip(sma(&closes, DC_WINDOW)?)
        .map(|((h, l), mean)| ratio(h - l, mean) * 100.0)
        .collect();
    let dcp = dch
        .iter()
        .zip(&dcl)
        .zip(&closes)
        .map(|((h, l), close)| ratio(close - l, h - l))
        .collect();

    let mut atr_indicator = build(AverageTrueRange::new(ATR_WINDOW), "ATR")?;
    let atr: Vec<f64> = candles.iter().map(|c| atr_indicator.next(c)).collect();

    Ok(vec![
        ("volatility_bbm", fill(bbm, 0.0)),
        ("volatility_bbh", fill(bbh, 0.0)),
        ("volatility_bbl", fill(bbl, 0.0)),
        ("volatility_bbw", fill(bbw, 0.0)),
        ("volatility_bbp", fill(bbp, 0.0)),
        ("volatility_bbhi", bbhi),
        ("volatility_bbli", bbli),
        ("volatility_kcc", fill(kcc, 0.0)),
        ("volatility_kch", fill(kch, 0.0)),
        ("volatility_kcl", fill(kcl, 0.0)),
        ("volatility_kcw", fill(kcw, 0.0)),
        ("volatility_kcp", fill(kcp, 0.0)),
        ("volatility_kchi", kchi),
        ("volatility_kcli", kcli),
        ("volatility_dcl", fill(dcl, 0.0)),
        ("volatility_dch", fill(dch, 0.0)),
        ("volatility_dcm", fill(dcm, 0.0)),
        ("volatility_dcw", fill(dcw, 0.0)),
        ("volatility_dcp", fill(dcp, 0.0)),
        ("volatility_atr", fill(atr, 0.0)),
        ("volatility_ui", ulcer_index(&closes)?),
    ])
}

/// Root mean square of the percentage drawdown from the rolling close high.
fn ulcer_index(closes: &[f64]) -> Result<Vec<f64>, Error> {
    let drawdown_sq: Vec<f64> = closes
        .iter()
        .zip(rolling_max(closes, UI_WINDOW)?)
        .map(|(close, peak)| {
            let drawdown = ratio(close - peak, peak) * 100.0;
            if drawdown.is_finite() { drawdown * drawdown } else { 0.0 }
        })
        .collect();

    Ok(fill(
        sma(&drawdown_sq, UI_WINDOW)?.into_iter().map(f64::sqrt).collect(),
        0.0,
    ))
}
