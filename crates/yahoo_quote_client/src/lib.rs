//! Yahoo Finance chart client.
//!
//! Fetches the latest price and day change for each configured symbol. The
//! chart endpoint answers one symbol per request, so a batch is issued as a
//! paced sequence of requests.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{Error, QuoteSnapshot, QuoteSource};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tracing::{debug, warn};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
/// Yahoo rejects generic agents on the chart endpoint.
const USER_AGENT: &str = "Mozilla/5.0 (deskboard)";
const REQUESTS_PER_SEC: u32 = 4;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Yahoo Finance chart client.
#[derive(Debug, Clone)]
pub struct YahooQuoteClient {
    client: reqwest::Client,
    pacer: Arc<DirectLimiter>,
}

/// Response from `/v8/finance/chart/{symbol}`. Only `meta` is used.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
pub struct ChartMeta {
    #[serde(rename = "regularMarketPrice", default)]
    pub regular_market_price: Option<f64>,
    #[serde(rename = "previousClose", default)]
    pub previous_close: Option<f64>,
    #[serde(rename = "chartPreviousClose", default)]
    pub chart_previous_close: Option<f64>,
}

impl YahooQuoteClient {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        Self::with_pace(timeout, REQUESTS_PER_SEC)
    }

    /// Create with a custom per-second request pace.
    pub fn with_pace(timeout: Duration, requests_per_sec: u32) -> Result<Self, Error> {
        let per_sec = NonZeroU32::new(requests_per_sec)
            .ok_or_else(|| Error::Config("quote request pace must be > 0".into()))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(2)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build Yahoo HTTP client: {e}")))?;

        Ok(Self {
            client,
            pacer: Arc::new(RateLimiter::direct(Quota::per_second(per_sec))),
        })
    }

    /// Fetch a single symbol's quote.
    pub async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot, Error> {
        self.pacer.until_ready().await;

        let url = format!("{CHART_URL}/{symbol}");
        debug!("Fetching Yahoo quote: {}", symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await
            .map_err(|e| Error::Quotes(format!("HTTP error for {symbol}: {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::Quotes(format!("Yahoo returned {status} for {symbol}")));
        }

        let payload: ChartResponse = resp
            .json()
            .await
            .map_err(|e| Error::Quotes(format!("JSON parse error for {symbol}: {e}")))?;

        quote_from_chart(symbol, payload)
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteClient {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<QuoteSnapshot>, Error> {
        let mut quotes = Vec::with_capacity(symbols.len());

        for symbol in symbols.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            match self.fetch_quote(symbol).await {
                Ok(quote) => {
                    debug!(
                        "{}: {:.2} ({:+.2}%)",
                        quote.symbol, quote.price, quote.change_percent
                    );
                    quotes.push(quote);
                }
                Err(e) => warn!("Skipping quote {}: {}", symbol, e),
            }
        }

        Ok(quotes)
    }
}

fn quote_from_chart(symbol: &str, payload: ChartResponse) -> Result<QuoteSnapshot, Error> {
    let meta = payload
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| Error::Quotes(format!("empty chart result for {symbol}")))?;

    let price = meta.regular_market_price.unwrap_or(0.0);
    if price == 0.0 {
        return Err(Error::Quotes(format!("zero price for {symbol}")));
    }

    let prev_close = meta
        .previous_close
        .filter(|p| *p != 0.0)
        .or(meta.chart_previous_close)
        .unwrap_or(0.0);

    let change_percent = if prev_close != 0.0 {
        (price - prev_close) / prev_close * 100.0
    } else {
        0.0
    };

    Ok(QuoteSnapshot {
        symbol: symbol.to_string(),
        price,
        change_percent,
        captured_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_from_chart_uses_previous_close() {
        let payload: ChartResponse = serde_json::from_str(
            r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 110.0, "previousClose": 100.0, "chartPreviousClose": 90.0}}], "error": null}}"#,
        )
        .expect("chart should deserialize");

        let quote = quote_from_chart("AAPL", payload).expect("quote should build");
        assert_eq!(quote.symbol, "AAPL");
        assert!((quote.change_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_quote_from_chart_falls_back_to_chart_previous_close() {
        let payload: ChartResponse = serde_json::from_str(
            r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 45.0, "chartPreviousClose": 50.0}}]}}"#,
        )
        .expect("chart should deserialize");

        let quote = quote_from_chart("GRF.MC", payload).expect("quote should build");
        assert!((quote.change_percent + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let payload: ChartResponse = serde_json::from_str(
            r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 0.0}}]}}"#,
        )
        .expect("chart should deserialize");
        assert!(quote_from_chart("BTC-USD", payload).is_err());
    }

    #[test]
    fn test_missing_result_is_rejected() {
        let payload: ChartResponse =
            serde_json::from_str(r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#)
                .expect("chart should deserialize");
        assert!(matches!(quote_from_chart("NOPE", payload), Err(Error::Quotes(_))));
    }

    #[test]
    fn test_zero_pace_is_config_error() {
        assert!(matches!(
            YahooQuoteClient::with_pace(Duration::from_secs(1), 0),
            Err(Error::Config(_))
        ));
    }
}
