//! Daily closes from the yahoo! finance chart API
//!
//! The simulator and the normalizer never fetch anything themselves, they take a PriceSeries. This module is where
//! those series come from: a [`QuoteSource`] returns raw daily quotes for a ticker and a date range, and
//! [`series_from_quotes`] turns them into a validated series. The full quotes, open to volume, also feed the price
//! history charts.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::series::{PriceSeries, SeriesError};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("fetching the data from yahoo! finance failed: {0}")]
    FetchFailed(String),
    #[error("deserializing response from yahoo! finance failed")]
    DeserializeFailed(#[from] serde_json::Error),
    #[error("connection to yahoo! finance server failed")]
    ConnectionFailed(#[from] reqwest::Error),
    #[error("yahoo! finance returned an empty data set")]
    EmptyDataSet,
    #[error("yahoo! finance returned inconsistent data")]
    DataInconsistency,
    #[error("yahoo! finance returned quotes that don't form a price series: {0}")]
    InvalidSeries(#[from] SeriesError),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub close: f64,
    pub adjclose: f64,
}

impl Quote {
    /// UTC trading day of the quote
    pub fn date(&self) -> Result<NaiveDate, ProviderError> {
        Ok(DateTime::from_timestamp(self.timestamp, 0)
            .ok_or(ProviderError::DataInconsistency)?
            .date_naive())
    }
}

#[derive(Deserialize, Debug)]
pub struct YResponse {
    pub chart: YChart,
}

#[derive(Deserialize, Debug)]
pub struct YChart {
    pub result: Option<Vec<YQuoteBlock>>,
    pub error: Option<YChartError>,
}

#[derive(Deserialize, Debug)]
pub struct YChartError {
    pub code: String,
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct YQuoteBlock {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: QuoteBlock,
}

#[derive(Deserialize, Debug)]
pub struct QuoteBlock {
    quote: Vec<QuoteList>,
    #[serde(default)]
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Deserialize, Debug)]
pub struct QuoteList {
    #[serde(default)]
    pub volume: Vec<Option<u64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub open: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug)]
pub struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

impl YResponse {
    pub fn from_json(json: serde_json::Value) -> Result<YResponse, ProviderError> {
        Ok(serde_json::from_value(json)?)
    }

    fn block(&self) -> Result<&YQuoteBlock, ProviderError> {
        if let Some(e) = &self.chart.error {
            return Err(ProviderError::FetchFailed(format!("{}: {}", e.code, e.description)));
        }
        self.chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .ok_or(ProviderError::EmptyDataSet)
    }

    fn check_consistency(block: &YQuoteBlock) -> Result<(), ProviderError> {
        let n = block.timestamp.len();
        let quote = block.indicators.quote.first().ok_or(ProviderError::EmptyDataSet)?;
        if quote.open.len() != n
            || quote.high.len() != n
            || quote.low.len() != n
            || quote.volume.len() != n
            || quote.close.len() != n
        {
            return Err(ProviderError::DataInconsistency);
        }
        if let Some(adjclose) = block.indicators.adjclose.as_ref().and_then(|a| a.first()) {
            if adjclose.adjclose.len() != n {
                return Err(ProviderError::DataInconsistency);
            }
        }
        Ok(())
    }

    /// Every row that has a close, in the order yahoo! sent them
    pub fn quotes(&self) -> Result<Vec<Quote>, ProviderError> {
        let block = self.block()?;
        Self::check_consistency(block)?;
        let quote = &block.indicators.quote[0];
        let adjcloses = block.indicators.adjclose.as_ref().and_then(|a| a.first());
        Ok(block
            .timestamp
            .iter()
            .enumerate()
            // rows without a close are days the exchange reported nothing for
            .filter_map(|(i, &timestamp)| {
                let close = quote.close[i]?;
                let adjclose = adjcloses.and_then(|a| a.adjclose[i]).unwrap_or(close);
                Some(Quote {
                    timestamp,
                    open: quote.open[i].unwrap_or(close),
                    high: quote.high[i].unwrap_or(close),
                    low: quote.low[i].unwrap_or(close),
                    volume: quote.volume[i].unwrap_or(0),
                    close,
                    adjclose,
                })
            })
            .collect())
    }
}

/// One quote per UTC date, in date order
///
/// yahoo! sometimes sends the running session as an extra row for today, the later row wins.
pub fn quotes_by_date(quotes: &[Quote]) -> Result<BTreeMap<NaiveDate, &Quote>, ProviderError> {
    let mut by_date = BTreeMap::new();
    for quote in quotes {
        by_date.insert(quote.date()?, quote);
    }
    Ok(by_date)
}

/// Turns quotes into a series of daily closes, keyed by their UTC date
pub fn series_from_quotes(quotes: &[Quote]) -> Result<PriceSeries, ProviderError> {
    Ok(PriceSeries::new(
        quotes_by_date(quotes)?
            .into_iter()
            .map(|(date, quote)| (date, quote.close))
            .collect(),
    )?)
}

/// Anything that can hand out daily quotes for a ticker
#[allow(async_fn_in_trait)]
pub trait QuoteSource {
    async fn quotes(
        &self,
        ticker: &str,
        start: &OffsetDateTime,
        end: &OffsetDateTime,
    ) -> Result<Vec<Quote>, ProviderError>;

    async fn price_series(
        &self,
        ticker: &str,
        start: &OffsetDateTime,
        end: &OffsetDateTime,
    ) -> Result<PriceSeries, ProviderError> {
        series_from_quotes(&self.quotes(ticker, start, end).await?)
    }
}

#[derive(Debug, Clone)]
pub struct YahooProvider {
    client: Client,
    // appended to tickers without an exchange suffix, ".VN" for Ho Chi Minh listings
    symbol_suffix: String,
}

impl YahooProvider {
    pub fn new(symbol_suffix: impl Into<String>) -> YahooProvider {
        YahooProvider {
            client: Client::new(),
            symbol_suffix: symbol_suffix.into(),
        }
    }

    pub fn symbol(&self, ticker: &str) -> String {
        if ticker.contains('.') || ticker.contains('=') {
            ticker.to_string()
        } else {
            format!("{ticker}{}", self.symbol_suffix)
        }
    }

    async fn chart(
        &self,
        symbol: &str,
        start: &OffsetDateTime,
        end: &OffsetDateTime,
    ) -> Result<YResponse, ProviderError> {
        let start = start.unix_timestamp();
        let end = end.unix_timestamp();
        // a fairly common user agent is necessary because otherwise we get rate limited
        let response = self
            .client
            .get(format!("{CHART_URL}/{symbol}"))
            .query(&[
                ("period1", start.to_string()),
                ("period2", end.to_string()),
                ("interval", "1d".to_string()),
            ])
            .header("USER-AGENT", "curl/7.68.0")
            .send()
            .await?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(ProviderError::FetchFailed(format!(
                "{symbol} answered with status {}",
                response.status()
            )));
        }
        // a 404 still carries the chart error body, which says more than the status
        YResponse::from_json(serde_json::from_str(&response.text().await?)?)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        YahooProvider::new("")
    }
}

impl QuoteSource for YahooProvider {
    async fn quotes(
        &self,
        ticker: &str,
        start: &OffsetDateTime,
        end: &OffsetDateTime,
    ) -> Result<Vec<Quote>, ProviderError> {
        let symbol = self.symbol(ticker);
        log::debug!("fetching daily quotes for {symbol} from {start} to {end}");
        let quotes = self.chart(&symbol, start, end).await?.quotes()?;
        log::debug!("{symbol}: {} quotes", quotes.len());
        Ok(quotes)
    }
}
