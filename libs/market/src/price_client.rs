use std::time::Duration;

use anyhow::{Context, Error, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, Request};
use serde::Deserialize;
use tracing::debug;

const YAHOO_BASE_API: &str = "https://query2.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
/// Bar size requested from the chart endpoint.
const DAILY_INTERVAL: &str = "1d";

/// Anything that can hand back a daily price history for a ticker.
#[allow(async_fn_in_trait)]
pub trait HistoryProvider {
    /// Full history from `start` up to now. An empty vector means the
    /// provider knows nothing about the range, which is not an error.
    async fn fetch_history(&self, symbol: &str, start: NaiveDate) -> Result<Vec<Bar>, Error>;
}

#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: String,
}

impl PriceClient {
    pub fn new(base_api: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_api: base_api.into(),
        })
    }

    /// Client for the public Yahoo Finance chart endpoint.
    pub fn yahoo() -> Result<Self> {
        Self::new(YAHOO_BASE_API)
    }

    /// Daily bars for `symbol` between `start` and `end`.
    pub async fn fetch_price(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, Error> {
        let request = self.chart_request(symbol, start, end)?;
        let res = self.client.execute(request).await?;

        let status = res.status();
        let body = res.text().await?;
        debug!(%status, bytes = body.len(), "chart response received");

        let chart: ChartResponse = match serde_json::from_str(&body) {
            Ok(chart) => chart,
            Err(_) if !status.is_success() => bail!("HTTP {status} for {symbol}"),
            Err(e) => {
                return Err(e).with_context(|| format!("malformed chart response for {symbol}"));
            }
        };

        let bars = parse_chart(chart)?;
        if !status.is_success() {
            bail!("HTTP {status} for {symbol}");
        }

        Ok(bars)
    }
}

impl PriceClient {
    fn chart_request(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: DateTime<Utc>,
    ) -> Result<Request, Error> {
        let period1 = start.and_time(NaiveTime::default()).and_utc().timestamp();
        let period2 = end.timestamp();

        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_api.trim_end_matches('/'),
            symbol
        );

        let request = self
            .client
            .get(url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", DAILY_INTERVAL.to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .build()?;
        Ok(request)
    }
}

impl HistoryProvider for PriceClient {
    async fn fetch_history(&self, symbol: &str, start: NaiveDate) -> Result<Vec<Bar>, Error> {
        self.fetch_price(symbol, start, Utc::now()).await
    }
}

/// One daily bar. Fields the provider left null stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

//
// Match Yahoo chart API JSON
// https://query2.finance.yahoo.com/v8/finance/chart/{symbol}
//
#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Turns a decoded chart payload into bars.
///
/// A provider-side error object becomes an `Err`, a result without
/// timestamps becomes an empty history. Timestamps are shifted by the
/// exchange's GMT offset so each bar lands on its local trading date.
pub(crate) fn parse_chart(resp: ChartResponse) -> Result<Vec<Bar>, Error> {
    if let Some(err) = resp.chart.error {
        bail!("{}: {}", err.code, err.description);
    }

    let Some(data) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let timestamp = DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| dt.date_naive())
            .with_context(|| format!("invalid timestamp: {ts}"))?;

        let field = |values: &[Option<f64>]| values.get(i).copied().flatten();
        let bar = Bar {
            timestamp,
            open: field(&quote.open),
            high: field(&quote.high),
            low: field(&quote.low),
            close: field(&quote.close),
            volume: field(&quote.volume),
        };

        // non-trading days come back as all-null rows
        if bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
            && bar.volume.is_none()
        {
            continue;
        }

        bars.push(bar);
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<Bar>, Error> {
        parse_chart(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn parses_bars_and_keeps_null_fields_missing() {
        let bars = parse(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":0},
                "timestamp":[1577836800,1577923200],
                "indicators":{"quote":[{
                    "open":[299.0,300.5],
                    "high":[301.0,302.0],
                    "low":[298.0,299.5],
                    "close":[300.0,301.0],
                    "volume":[1000,null]
                }]}
            }],"error":null}}"#,
        )
        .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(bars[0].close, Some(300.0));
        assert_eq!(bars[0].volume, Some(1000.0));
        assert_eq!(bars[1].timestamp, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(bars[1].volume, None);
    }

    #[test]
    fn gmt_offset_moves_bar_to_exchange_date() {
        // 2020-01-01T23:00:00Z is already 2020-01-02 in Sydney (+11h)
        let bars = parse(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":39600},
                "timestamp":[1577919600],
                "indicators":{"quote":[{"open":[1.0],"high":[1.0],"low":[1.0],"close":[1.0],"volume":[0]}]}
            }],"error":null}}"#,
        )
        .unwrap();

        assert_eq!(bars[0].timestamp, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
    }

    #[test]
    fn all_null_rows_are_skipped() {
        let bars = parse(
            r#"{"chart":{"result":[{
                "timestamp":[1577836800,1577923200],
                "indicators":{"quote":[{
                    "open":[null,1.0],"high":[null,1.0],"low":[null,1.0],
                    "close":[null,1.0],"volume":[null,5]
                }]}
            }],"error":null}}"#,
        )
        .unwrap();

        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn missing_timestamps_mean_empty_history() {
        let bars = parse(
            r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn provider_error_is_reported() {
        let err = parse(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Not Found"));
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn chart_request_asks_for_daily_bars() {
        let client = PriceClient::new("https://example.test/").unwrap();
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let end = DateTime::from_timestamp(1_600_000_000, 0).unwrap();

        let request = client.chart_request("EURUSD=X", start, end).unwrap();
        assert_eq!(request.url().path(), "/v8/finance/chart/EURUSD=X");

        let query = request.url().query().unwrap();
        assert!(query.contains("interval=1d"));
        assert!(query.contains("period1=1262304000"));
        assert!(query.contains("period2=1600000000"));
    }
}
