//! Yahoo Finance quote provider
//!
//! Reads the current price and sector from the quoteSummary endpoint, falling
//! back to the chart endpoint's `regularMarketPrice` when the summary has no
//! usable price. Each request is bounded by the configured timeout.

use super::{MarketDataProvider, Quote, UNKNOWN_SECTOR};
use crate::error::{Result, ScreenerError};
use crate::types::Ticker;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const YAHOO_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quotes (no API key required)
pub struct YahooFinanceQuotes {
    client: Client,
    runtime: tokio::runtime::Runtime,
    exchange_suffix: String,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    regular_market_price: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    price: Option<PriceModule>,
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<SummaryResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

impl YahooFinanceQuotes {
    /// Create a provider; `exchange_suffix` is appended to every ticker
    pub fn new(exchange_suffix: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ScreenerError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScreenerError::ConfigError(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            client,
            runtime,
            exchange_suffix: exchange_suffix.to_string(),
        })
    }

    /// Symbol as Yahoo knows it
    pub fn yahoo_symbol(&self, ticker: &Ticker) -> String {
        format!("{}{}", ticker, self.exchange_suffix)
    }

    /// Fetch price and sector for a single ticker
    pub async fn fetch_quote(&self, ticker: &Ticker) -> Result<Quote> {
        let symbol = self.yahoo_symbol(ticker);
        let url = format!(
            "{}/{}?modules=price,assetProfile",
            YAHOO_SUMMARY_URL, symbol
        );
        let text = self.get_text(ticker, &url).await?;
        let mut quote = parse_summary(&text).map_err(|e| ScreenerError::market_data(ticker.as_str(), e))?;

        if quote.price.is_none() {
            log::debug!("No summary price for {}, trying chart endpoint", symbol);
            let url = format!("{}/{}?range=1d&interval=1d", YAHOO_CHART_URL, symbol);
            match self.get_text(ticker, &url).await.and_then(|body| {
                parse_chart_price(&body).map_err(|e| ScreenerError::market_data(ticker.as_str(), e))
            }) {
                Ok(price) => quote = Quote::new(price, quote.sector),
                Err(e) => log::warn!("Chart fallback failed for {}: {}", symbol, e),
            }
        }

        require_price(ticker, quote)
    }

    async fn get_text(&self, ticker: &Ticker, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let cause = if e.is_timeout() {
                "Timeout".to_string()
            } else if e.is_connect() {
                "Network error".to_string()
            } else {
                e.to_string()
            };
            ScreenerError::market_data(ticker.as_str(), cause)
        })?;

        if !response.status().is_success() {
            return Err(ScreenerError::market_data(
                ticker.as_str(),
                format!("Yahoo Finance returned {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| ScreenerError::market_data(ticker.as_str(), e))
    }
}

/// Extract a quote from a quoteSummary body
fn parse_summary(body: &str) -> std::result::Result<Quote, String> {
    let response: SummaryResponse =
        serde_json::from_str(body).map_err(|e| format!("Missing field: {}", e))?;

    if let Some(err) = response.quote_summary.error.filter(|e| !e.is_null()) {
        return Err(format!("Yahoo error: {}", err));
    }

    let result = response
        .quote_summary
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| "empty quoteSummary result".to_string())?;

    let price = result
        .price
        .and_then(|p| p.regular_market_price)
        .and_then(|v| v.raw);
    let sector = result
        .asset_profile
        .and_then(|a| a.sector)
        .unwrap_or_else(|| UNKNOWN_SECTOR.to_string());

    Ok(Quote::new(price, sector))
}

/// A quote without a price is a failed lookup, not a partial success
fn require_price(ticker: &Ticker, quote: Quote) -> Result<Quote> {
    match quote.price {
        Some(_) => Ok(quote),
        None => Err(ScreenerError::market_data(
            ticker.as_str(),
            "Missing field: regularMarketPrice",
        )),
    }
}

/// Extract the last market price from a chart body
fn parse_chart_price(body: &str) -> std::result::Result<Option<f64>, String> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| format!("Missing field: {}", e))?;
    Ok(response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|r| r.meta.regular_market_price))
}

impl MarketDataProvider for YahooFinanceQuotes {
    fn lookup(&self, ticker: &Ticker) -> Result<Quote> {
        self.runtime.block_on(self.fetch_quote(ticker))
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let source = YahooFinanceQuotes::new(".JK", Duration::from_secs(5)).unwrap();
        let ticker = Ticker::parse("bbca").unwrap();
        assert_eq!(source.yahoo_symbol(&ticker), "BBCA.JK");
    }

    #[test]
    fn test_parse_summary() {
        let body = r#"{"quoteSummary":{"result":[{
            "price":{"regularMarketPrice":{"raw":9125.0,"fmt":"9,125.00"}},
            "assetProfile":{"sector":"Financial Services"}
        }],"error":null}}"#;
        let quote = parse_summary(body).unwrap();
        assert_eq!(quote.price, Some(9125.0));
        assert_eq!(quote.sector, "Financial Services");
    }

    #[test]
    fn test_parse_summary_missing_profile() {
        let body = r#"{"quoteSummary":{"result":[{"price":{"regularMarketPrice":{}}}],"error":null}}"#;
        let quote = parse_summary(body).unwrap();
        assert_eq!(quote.price, None);
        assert_eq!(quote.sector, UNKNOWN_SECTOR);
    }

    #[test]
    fn test_parse_summary_error() {
        let body = r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found"}}}"#;
        assert!(parse_summary(body).is_err());
        assert!(parse_summary("<html>").is_err());
    }

    #[test]
    fn test_missing_price_is_lookup_error() {
        let ticker = Ticker::parse("TLKM").unwrap();
        let body = r#"{"quoteSummary":{"result":[{
            "price":{"regularMarketPrice":{}},
            "assetProfile":{"sector":"Communication Services"}
        }],"error":null}}"#;
        let quote = parse_summary(body).unwrap();
        assert_eq!(quote.price, None);

        match require_price(&ticker, quote) {
            Err(ScreenerError::MarketData { ticker, cause }) => {
                assert_eq!(ticker, "TLKM");
                assert!(cause.contains("regularMarketPrice"));
            }
            other => panic!("expected market data error, got {:?}", other),
        }

        let priced = require_price(&ticker, Quote::new(Some(3100.0), "Communication Services")).unwrap();
        assert_eq!(priced.price, Some(3100.0));
    }

    #[test]
    fn test_chart_without_price() {
        let body = r#"{"chart":{"result":[{"meta":{}}],"error":null}}"#;
        assert_eq!(parse_chart_price(body).unwrap(), None);
    }

    #[test]
    fn test_parse_chart_price() {
        let body = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":4310.0}}],"error":null}}"#;
        assert_eq!(parse_chart_price(body).unwrap(), Some(4310.0));
    }
}
