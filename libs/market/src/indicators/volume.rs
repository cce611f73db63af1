use anyhow::{Error, Result};
use ta::Next;
use ta::indicators::{MoneyFlowIndex, OnBalanceVolume};

use super::{Candle, Features, build, ema, fill, ratio, rolling_sum, sma};

const CMF_WINDOW: usize = 20;
const FI_WINDOW: usize = 13;
const EM_WINDOW: usize = 14;
const EM_SCALE: f64 = 100_000_000.0;
const MFI_WINDOW: usize = 14;
const VWAP_WINDOW: usize = 14;
const NVI_START: f64 = 1_000.0;

pub(crate) fn features(candles: &[Candle]) -> Result<Features, Error> {
    let mfv = money_flow_volume(candles);
    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let adi = rolling_sum(&mfv, usize::MAX);

    let mut obv_indicator = OnBalanceVolume::default();
    let obv: Vec<f64> = candles.iter().map(|c| obv_indicator.next(c)).collect();

    let cmf: Vec<f64> = rolling_sum(&mfv, CMF_WINDOW)
        .into_iter()
        .zip(rolling_sum(&volume, CMF_WINDOW))
        .map(|(flow, vol)| ratio(flow, vol))
        .collect();

    let force: Vec<f64> = candles
        .iter()
        .enumerate()
        .map(|(i, c)| match i {
            0 => 0.0,
            _ => (c.close - candles[i - 1].close) * c.volume,
        })
        .collect();
    let fi = ema(&force, FI_WINDOW)?;

    let em = fill(ease_of_movement(candles), 0.0);
    let sma_em = sma(&em, EM_WINDOW)?;

    let mut vpt = Vec::with_capacity(candles.len());
    let mut running = 0.0;
    for (i, c) in candles.iter().enumerate() {
        if i > 0 {
            let prev = candles[i - 1].close;
            let step = c.volume * ratio(c.close - prev, prev);
            if step.is_finite() {
                running += step;
            }
        }
        vpt.push(running);
    }

    let mut mfi_indicator = build(MoneyFlowIndex::new(MFI_WINDOW), "MFI")?;
    let mfi: Vec<f64> = candles.iter().map(|c| mfi_indicator.next(c)).collect();

    Ok(vec![
        ("volume_adi", fill(adi, 0.0)),
        ("volume_obv", fill(obv, 0.0)),
        ("volume_cmf", fill(cmf, 0.0)),
        ("volume_fi", fill(fi, 0.0)),
        ("volume_em", em),
        ("volume_sma_em", fill(sma_em, 0.0)),
        ("volume_vpt", vpt),
        ("volume_vwap", vwap(candles)),
        ("volume_mfi", fill(mfi, 50.0)),
        ("volume_nvi", negative_volume_index(candles)),
    ])
}

/// Close location value times volume. A bar with no range contributes
/// nothing.
fn money_flow_volume(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .map(|c| {
            let clv = ratio((c.close - c.low) - (c.high - c.close), c.high - c.low);
            if clv.is_finite() { clv * c.volume } else { 0.0 }
        })
        .collect()
}

/// Midpoint move times bar range per unit of volume, scaled by 1e8.
fn ease_of_movement(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| match i {
            0 => f64::NAN,
            _ => {
                let prev = &candles[i - 1];
                let moved = (c.high - prev.high) + (c.low - prev.low);
                ratio(moved * (c.high - c.low), 2.0 * c.volume) * EM_SCALE
            }
        })
        .collect()
}

/// Compounds the close-to-close return only on bars whose volume fell.
fn negative_volume_index(candles: &[Candle]) -> Vec<f64> {
    let mut nvi = Vec::with_capacity(candles.len());
    let mut level = NVI_START;
    for (i, c) in candles.iter().enumerate() {
        if i > 0 && c.volume < candles[i - 1].volume {
            let change = ratio(c.close - candles[i - 1].close, candles[i - 1].close);
            if change.is_finite() {
                level *= 1.0 + change;
            }
        }
        nvi.push(level);
    }
    nvi
}

/// Rolling volume-weighted typical price. Windows that traded no volume
/// fall back to the plain typical price.
fn vwap(candles: &[Candle]) -> Vec<f64> {
    let typical: Vec<f64> = candles
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();
    let weighted: Vec<f64> = typical
        .iter()
        .zip(candles)
        .map(|(tp, c)| tp * c.volume)
        .collect();
    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    rolling_sum(&weighted, VWAP_WINDOW)
        .into_iter()
        .zip(rolling_sum(&volume, VWAP_WINDOW))
        .zip(&typical)
        .map(|((pv, v), &tp)| {
            let value = ratio(pv, v);
            if value.is_finite() { value } else { tp }
        })
        .collect()
}
