//! Stock quotes from the Yahoo Finance chart API.

use chrono::DateTime;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use protocol::ToolError;

use super::transport_error;
use crate::handler::{HandlerFuture, ToolHandler};

const YAHOO_CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const VALID_PERIODS: [&str; 7] = ["1d", "5d", "1mo", "3mo", "6mo", "1y", "5y"];
const DEFAULT_PERIOD: &str = "1mo";
const MAX_SYMBOL_LEN: usize = 10;

/// Looks up a quote plus the latest trading day's OHLCV for one ticker.
#[derive(Debug)]
pub struct StockQuote {
    http: reqwest::Client,
    endpoint: String,
}

impl StockQuote {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: YAHOO_CHART_BASE.to_string(),
        }
    }

    /// Point the handler at a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Ticker syntax: leading A-Z, then A-Z, 0-9, '.' or '-' (BRK.B, BF-B).
fn is_valid_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    symbol.len() <= MAX_SYMBOL_LEN
        && first.is_ascii_uppercase()
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    exchange_name: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
}

#[derive(Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn rfc3339(unix: i64) -> Option<String> {
    DateTime::from_timestamp(unix, 0).map(|dt| dt.to_rfc3339())
}

/// The most recent bar in the chart, if any.
fn latest_bar(result: &ChartResult) -> Option<Value> {
    let ts = *result.timestamp.last()?;
    let date = DateTime::from_timestamp(ts, 0)?.format("%Y-%m-%d").to_string();
    let quote = result.indicators.quote.first()?;

    Some(json!({
        "date": date,
        "open": quote.open.last().copied().flatten(),
        "high": quote.high.last().copied().flatten(),
        "low": quote.low.last().copied().flatten(),
        "close": quote.close.last().copied().flatten(),
        "volume": quote.volume.last().copied().flatten(),
    }))
}

impl ToolHandler for StockQuote {
    fn name(&self) -> &str {
        "stock_quote"
    }

    fn description(&self) -> &str {
        "Get the current quote and latest trading day for a stock ticker symbol."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Uppercase ticker symbol, e.g. AAPL or BRK.B"
                },
                "period": {
                    "type": "string",
                    "description": "History range for the chart",
                    "enum": VALID_PERIODS,
                    "default": DEFAULT_PERIOD
                }
            },
            "required": ["symbol"]
        })
    }

    fn validate(&self, arguments: Value) -> Result<Value, ToolError> {
        let symbol = arguments
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'symbol' argument".into()))?
            .trim();

        // Cheap rejection: bad syntax never reaches the network.
        if !is_valid_symbol(symbol) {
            return Err(ToolError::InvalidInput(format!(
                "'{symbol}' is not a valid ticker symbol (expected uppercase like AAPL or BRK.B)"
            )));
        }

        let period = match arguments.get("period") {
            None | Some(Value::Null) => DEFAULT_PERIOD,
            Some(v) => v
                .as_str()
                .filter(|p| VALID_PERIODS.contains(p))
                .ok_or_else(|| {
                    ToolError::InvalidInput(format!(
                        "'period' must be one of: {}",
                        VALID_PERIODS.join(", ")
                    ))
                })?,
        };

        Ok(json!({ "symbol": symbol, "period": period }))
    }

    fn execute(&self, arguments: Value) -> HandlerFuture<'_> {
        Box::pin(async move {
            let symbol = arguments["symbol"].as_str().unwrap_or_default().to_string();
            let period = arguments["period"].as_str().unwrap_or(DEFAULT_PERIOD);

            let response = self
                .http
                .get(format!("{}/{symbol}", self.endpoint))
                .query(&[
                    ("range", period),
                    ("interval", "1d"),
                    ("includePrePost", "false"),
                ])
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(ToolError::NotFound(format!(
                    "no instrument found for symbol {symbol}"
                )));
            }
            if !status.is_success() {
                return Err(ToolError::Transport(format!(
                    "quote provider returned HTTP {status}"
                )));
            }

            let data: ChartResponse =
                response.json().await.map_err(|e| transport_error(&e))?;

            let result = match data.chart.result.as_ref().and_then(|r| r.first()) {
                Some(result) if data.chart.error.is_none() => result,
                _ => {
                    return Err(ToolError::NotFound(format!(
                        "no instrument found for symbol {symbol}"
                    )));
                }
            };

            let meta = &result.meta;
            let price = meta.regular_market_price.ok_or_else(|| {
                ToolError::Transport("quote response is missing the market price".into())
            })?;

            let as_of = meta
                .regular_market_time
                .or_else(|| result.timestamp.last().copied())
                .and_then(rfc3339);

            Ok(json!({
                "symbol": meta.symbol,
                "exchange": meta.exchange_name,
                "currency": meta.currency,
                "price": price,
                "previous_close": meta.chart_previous_close,
                "as_of": as_of,
                "latest": latest_bar(result),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> StockQuote {
        StockQuote::new(reqwest::Client::new())
    }

    #[test]
    fn accepts_plain_and_dotted_tickers() {
        for symbol in ["AAPL", "MSFT", "BRK.B", "BF-B", "X"] {
            assert!(is_valid_symbol(symbol), "{symbol} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_tickers() {
        for symbol in ["", "aapl", "NOT_A_TICKER!", "TOOLONGSYMBOL", "1ABC", ".X"] {
            assert!(!is_valid_symbol(symbol), "{symbol} should be invalid");
        }
    }

    #[test]
    fn validate_rejects_bad_symbol_before_any_network_call() {
        let err = handler()
            .validate(json!({"symbol": "NOT_A_TICKER!"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn validate_applies_default_period() {
        let normalized = handler().validate(json!({"symbol": "AAPL"})).unwrap();
        assert_eq!(normalized["period"], DEFAULT_PERIOD);
    }

    #[test]
    fn validate_rejects_unknown_period() {
        let err = handler()
            .validate(json!({"symbol": "AAPL", "period": "2w"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn rfc3339_formats_unix_seconds() {
        assert_eq!(rfc3339(0).unwrap(), "1970-01-01T00:00:00+00:00");
    }
}
