//! Alpha Vantage daily price history adapter.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::types::{HistoricalSource, PriceBar, Result, SourceError};

const SOURCE_NAME: &str = "alphavantage";

pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: "https://www.alphavantage.co".to_string(),
            api_key,
        }
    }

    /// Point the client at a different endpoint, for tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn fetch_daily_bars(&self, ticker: &str, days: u32) -> Result<Vec<PriceBar>> {
        let output_size = if days > 100 { "full" } else { "compact" };
        let url = format!("{}/query", self.base_url);

        debug!("Fetching {} days of history for {}", days, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", ticker),
                ("outputsize", output_size),
                ("apikey", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| classify_request_error(e, SOURCE_NAME))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(classify_status(status, response, SOURCE_NAME).await);
        }

        let payload: DailyResponse = response.json().await.map_err(|e| {
            SourceError::Malformed {
                origin: SOURCE_NAME.to_string(),
                message: e.to_string(),
            }
        })?;

        // A 200 with a "Note" body is how Alpha Vantage reports quota exhaustion
        if payload.note.is_some() {
            return Err(SourceError::RateLimited {
                origin: SOURCE_NAME.to_string(),
                retry_after: None,
            });
        }

        let time_series = payload.time_series.ok_or_else(|| SourceError::Malformed {
            origin: SOURCE_NAME.to_string(),
            message: payload
                .error_message
                .unwrap_or_else(|| "missing time series".to_string()),
        })?;

        let cutoff = Utc::now().date_naive() - Duration::days(days as i64);
        let mut bars = Vec::new();
        for (date_str, values) in time_series {
            let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") else {
                continue;
            };
            if date < cutoff {
                continue;
            }
            bars.push(PriceBar {
                date,
                open: parse_field(&values.open)?,
                high: parse_field(&values.high)?,
                low: parse_field(&values.low)?,
                close: parse_field(&values.close)?,
                volume: parse_field(&values.volume)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

fn parse_field(raw: &str) -> Result<f64> {
    raw.parse().map_err(|_| SourceError::Malformed {
        origin: SOURCE_NAME.to_string(),
        message: format!("unparsable numeric field: {raw:?}"),
    })
}

/// Map an HTTP status onto the error taxonomy
pub(crate) async fn classify_status(
    status: StatusCode,
    response: reqwest::Response,
    source: &str,
) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            SourceError::RateLimited {
                origin: source.to_string(),
                retry_after,
            }
        }
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            let message = response.text().await.unwrap_or_default();
            SourceError::Forbidden {
                origin: source.to_string(),
                message,
            }
        }
        status if status.is_server_error() => {
            let message = response.text().await.unwrap_or_default();
            SourceError::Transient {
                origin: source.to_string(),
                message: format!("{status}: {message}"),
            }
        }
        status => {
            let message = response.text().await.unwrap_or_default();
            SourceError::Other(format!("{source} returned {status}: {message}"))
        }
    }
}

/// Connection and timeout failures are retryable; everything else is not
pub(crate) fn classify_request_error(error: reqwest::Error, source: &str) -> SourceError {
    if error.is_timeout() || error.is_connect() {
        SourceError::Transient {
            origin: source.to_string(),
            message: error.to_string(),
        }
    } else {
        SourceError::Other(format!("{source}: {error}"))
    }
}

#[async_trait::async_trait]
impl HistoricalSource for AlphaVantageClient {
    async fn fetch_bars(&self, ticker: &str, days: u32) -> Result<Vec<PriceBar>> {
        self.fetch_daily_bars(ticker, days).await
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// Response types for the Alpha Vantage API
#[derive(Debug, serde::Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyValues>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct DailyValues {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}
