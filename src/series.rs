//! Daily closing prices
//!
//! A PriceSeries is what the provider hands to the simulator and the normalizer: closes ordered by date,
//! one per day, every one of them strictly positive. It is validated once on construction and never mutated afterwards.
//!
//! Usage:
//! ```
//! use chrono::NaiveDate;
//! use findash::series::PriceSeries;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
//! let series = PriceSeries::new(vec![(day(1), 10.0), (day(4), 10.5)]).unwrap();
//! assert_eq!(series.last_close(), Some(10.5));
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("observation {index} is not dated after the previous one")]
    Unordered { index: usize },
    #[error("observation {index} has a close of {price}, closes must be finite and positive")]
    NonPositivePrice { index: usize, price: f64 },
}

/// One close on one trading day
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub close: f64,
}

/// Holds the closing prices of one instrument
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PriceSeries {
    observations: Vec<Observation>,
}

impl PriceSeries {
    /// Builds a series from (date, close) pairs, which must already be in ascending date order
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self, SeriesError> {
        let mut observations: Vec<Observation> = Vec::with_capacity(points.len());
        for (index, (date, close)) in points.into_iter().enumerate() {
            if !close.is_finite() || close <= 0.0 {
                return Err(SeriesError::NonPositivePrice { index, price: close });
            }
            if let Some(previous) = observations.last() {
                if previous.date >= date {
                    return Err(SeriesError::Unordered { index });
                }
            }
            observations.push(Observation { date, close });
        }
        Ok(PriceSeries { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.close)
    }

    pub fn first(&self) -> Option<&Observation> {
        self.observations.first()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.observations.last().map(|o| o.close)
    }
}
