use super::{Candle, Features, fill, ratio};

/// Daily, daily-log and cumulative returns, in percent.
pub(crate) fn features(candles: &[Candle]) -> Features {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let dr = (0..closes.len())
        .map(|i| match i {
            0 => 0.0,
            _ => (ratio(closes[i], closes[i - 1]) - 1.0) * 100.0,
        })
        .collect();

    let dlr = (0..closes.len())
        .map(|i| match i {
            0 => 0.0,
            _ => ratio(closes[i], closes[i - 1]).ln() * 100.0,
        })
        .collect();

    let first = closes.first().copied().unwrap_or(f64::NAN);
    let cr = closes
        .iter()
        .map(|&c| (ratio(c, first) - 1.0) * 100.0)
        .collect();

    vec![
        ("others_dr", fill(dr, 0.0)),
        ("others_dlr", fill(dlr, 0.0)),
        ("others_cr", fill(cr, 0.0)),
    ]
}
