//! Daily price history for the charts
//!
//! Every trading day in a range becomes a [`Candle`]: open, high, low, close, the dividend adjusted close, the
//! volume, and the 50 day simple moving average of the close once enough days are in the range to fill the window.

use chrono::NaiveDate;
use serde::Serialize;

use crate::yahoo_finance::{quotes_by_date, ProviderError, Quote};

pub const SMA_WINDOW: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjclose: f64,
    pub volume: u64,
    /// `None` for the first days of the range, before the window is full
    pub sma_50: Option<f64>,
}

/// Mean of each value and the `window - 1` values before it
///
/// The first `window - 1` entries have no full window and are `None`, a window of 0 gives `None` everywhere.
pub fn simple_moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut averages = vec![None; values.len()];
    if window == 0 || window > values.len() {
        return averages;
    }
    let mut sum: f64 = values[..window].iter().sum();
    averages[window - 1] = Some(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        averages[i] = Some(sum / window as f64);
    }
    averages
}

/// One candle per UTC trading day, in date order
pub fn candles(quotes: &[Quote]) -> Result<Vec<Candle>, ProviderError> {
    let by_date = quotes_by_date(quotes)?;
    let closes: Vec<f64> = by_date.values().map(|q| q.close).collect();
    let sma = simple_moving_average(&closes, SMA_WINDOW);
    Ok(by_date
        .into_iter()
        .zip(sma)
        .map(|((date, quote), sma_50)| Candle {
            date,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            adjclose: quote.adjclose,
            volume: quote.volume,
            sma_50,
        })
        .collect())
}
