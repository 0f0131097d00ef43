//! Portfolio trend comparison
//!
//! Prices of different instruments live on different scales, so plotting them together says little. This module
//! rescales every series against its own first close so they all start at 100 and can be read as percentage growth.
//!
//! Instruments that can't be normalized (nothing was fetched, or the fetch failed) are left out of the result and
//! reported as warnings instead, the rest of the portfolio is still returned.
//!
//! Usage:
//! ```
//! use std::collections::BTreeMap;
//! use chrono::NaiveDate;
//! use findash::normalize::normalize;
//! use findash::series::PriceSeries;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap();
//! let mut portfolio = BTreeMap::new();
//! portfolio.insert("FPT".to_string(), PriceSeries::new(vec![(day(2), 10.0), (day(3), 12.0)]).unwrap());
//! let normalized = normalize(&portfolio);
//! assert_eq!(normalized.series["FPT"][1].value, 120.0);
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::series::PriceSeries;
use crate::yahoo_finance::ProviderError;

/// Value every normalized series starts at
pub const BASELINE: f64 = 100.0;

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub date: NaiveDate,
    pub value: f64,
}

pub type NormalizedSeries = Vec<NormalizedPoint>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WarningReason {
    EmptySeries,
    FetchFailed(String),
}

/// An instrument that was dropped from the result, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentWarning {
    pub instrument: String,
    pub reason: WarningReason,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Normalized {
    pub series: BTreeMap<String, NormalizedSeries>,
    pub warnings: Vec<InstrumentWarning>,
}

fn rescale(series: &PriceSeries) -> Option<NormalizedSeries> {
    let baseline = series.first()?.close;
    Some(
        series
            .observations()
            .iter()
            .map(|o| NormalizedPoint {
                date: o.date,
                value: BASELINE * o.close / baseline,
            })
            .collect(),
    )
}

/// Rescales every series so its first close maps to 100
pub fn normalize(series: &BTreeMap<String, PriceSeries>) -> Normalized {
    let mut normalized = Normalized::default();
    for (instrument, prices) in series {
        match rescale(prices) {
            Some(points) => {
                normalized.series.insert(instrument.clone(), points);
            }
            None => {
                log::warn!("{instrument} has no prices, leaving it out of the portfolio");
                normalized.warnings.push(InstrumentWarning {
                    instrument: instrument.clone(),
                    reason: WarningReason::EmptySeries,
                });
            }
        }
    }
    normalized
}

/// Same as [`normalize`], with fetch failures turned into warnings for their instrument
pub fn normalize_fetched(results: BTreeMap<String, Result<PriceSeries, ProviderError>>) -> Normalized {
    let mut fetched = BTreeMap::new();
    let mut failures = Vec::new();
    for (instrument, result) in results {
        match result {
            Ok(prices) => {
                fetched.insert(instrument, prices);
            }
            Err(e) => {
                log::warn!("fetching {instrument} failed: {e}");
                failures.push(InstrumentWarning {
                    instrument,
                    reason: WarningReason::FetchFailed(e.to_string()),
                });
            }
        }
    }
    let mut normalized = normalize(&fetched);
    normalized.warnings.extend(failures);
    normalized.warnings.sort_by(|a, b| a.instrument.cmp(&b.instrument));
    normalized
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        PriceSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| (start + Duration::days(i as i64), c))
                .collect(),
        )
        .unwrap()
    }

    fn values(normalized: &Normalized, instrument: &str) -> Vec<f64> {
        normalized.series[instrument].iter().map(|p| p.value).collect()
    }

    #[test]
    fn single_instrument() {
        let portfolio = BTreeMap::from([("FPT".to_string(), series(&[10.0, 20.0, 5.0]))]);
        let normalized = normalize(&portfolio);
        assert_eq!(values(&normalized, "FPT"), vec![100.0, 200.0, 50.0]);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn empty_portfolio() {
        let normalized = normalize(&BTreeMap::new());
        assert!(normalized.series.is_empty());
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn each_series_uses_its_own_first_close() {
        let late = PriceSeries::new(vec![
            (NaiveDate::from_ymd_opt(2020, 1, 5).unwrap(), 4.0),
            (NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(), 5.0),
        ])
        .unwrap();
        let portfolio = BTreeMap::from([
            ("VCB".to_string(), series(&[80.0, 88.0, 72.0])),
            ("HPG".to_string(), late),
        ]);
        let normalized = normalize(&portfolio);
        assert_eq!(values(&normalized, "VCB"), vec![100.0, 110.0, 90.0]);
        assert_eq!(values(&normalized, "HPG"), vec![100.0, 125.0]);
        assert_eq!(
            normalized.series["HPG"][0].date,
            NaiveDate::from_ymd_opt(2020, 1, 5).unwrap()
        );
    }

    #[test]
    fn empty_series_is_dropped_with_a_warning() {
        let portfolio = BTreeMap::from([
            ("ACB".to_string(), PriceSeries::default()),
            ("FPT".to_string(), series(&[10.0, 11.0])),
        ]);
        let normalized = normalize(&portfolio);
        assert_eq!(normalized.series.len(), 1);
        assert_eq!(
            normalized.warnings,
            vec![InstrumentWarning {
                instrument: "ACB".to_string(),
                reason: WarningReason::EmptySeries
            }]
        );
    }

    #[test]
    fn fetch_failures_do_not_abort_the_rest() {
        let results = BTreeMap::from([
            ("BID".to_string(), Err(ProviderError::EmptyDataSet)),
            ("FPT".to_string(), Ok(series(&[10.0, 15.0]))),
            ("ACB".to_string(), Ok(PriceSeries::default())),
        ]);
        let normalized = normalize_fetched(results);
        assert_eq!(values(&normalized, "FPT"), vec![100.0, 150.0]);
        assert_eq!(normalized.warnings.len(), 2);
        assert_eq!(normalized.warnings[0].reason, WarningReason::EmptySeries);
        assert_eq!(normalized.warnings[1].instrument, "BID");
        assert!(matches!(normalized.warnings[1].reason, WarningReason::FetchFailed(_)));
    }

    #[test]
    fn warnings_serialize_with_their_kind() {
        let warning = InstrumentWarning {
            instrument: "BID".to_string(),
            reason: WarningReason::FetchFailed("timeout".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&warning).unwrap(),
            serde_json::json!({"instrument": "BID", "reason": {"kind": "fetch_failed", "message": "timeout"}})
        );
    }
}
