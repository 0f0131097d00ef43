//! Forward price paths and Value at Risk
//!
//! # Monte-Carlo simulation
//! Estimates the daily volatility of an instrument from its recent closes and walks a number of independent
//! [random paths](https://en.wikipedia.org/wiki/Monte_Carlo_method) forward from the last close. Every day of every path
//! moves the price by `1 + sigma * z`, with `z` drawn from a standard normal. There is no drift term.
//!
//! Volatility is the population standard deviation of the day-over-day returns. Because the noise is additive on the
//! return, a volatility of 1 or more can push a path to zero or below; that is a limitation of the model, not of the
//! implementation.
//!
//! # Value at Risk
//! The 95% [Value at Risk](https://en.wikipedia.org/wiki/Value_at_risk) is the last close minus the 5th percentile of
//! the terminal prices, the percentile being linearly interpolated between order statistics. It can be negative.
//!
//! # Usage:
//! ```
//! use chrono::NaiveDate;
//! use findash::series::PriceSeries;
//! use findash::simulation::{simulate_parallel, SimulationParams};
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
//! let history = PriceSeries::new(vec![(day(2), 100.0), (day(3), 101.0), (day(6), 99.5)]).unwrap();
//! let params = SimulationParams::new(500, 30).unwrap();
//! let simulation = simulate_parallel(&history, params, 42).unwrap();
//! assert_eq!(simulation.paths.path_count(), 500);
//! println!("VaR 95% = {:.2}", simulation.value_at_risk);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rstat::univariate::normal::Normal;
use rstat::Distribution;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::series::PriceSeries;

/// Percentile of the terminal prices the Value at Risk is measured against
pub const VAR_PERCENTILE: f64 = 5.0;

/// Path counts the dashboard offers, any other positive number works too
pub const PATH_COUNT_CHOICES: [usize; 3] = [200, 500, 1000];
/// Horizons in days the dashboard offers
pub const HORIZON_CHOICES: [usize; 3] = [30, 60, 90];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("at least 2 closing prices are needed to estimate returns, got {observations}")]
    InsufficientData { observations: usize },
    #[error("{name} must be at least 1, got {value}")]
    InvalidParameter { name: &'static str, value: usize },
    #[error("{path_count} paths of {horizon_days} days are more prices than can be allocated")]
    Oversized { path_count: usize, horizon_days: usize },
}

/// Number of paths and days per path, both at least 1
///
/// Memory grows with `path_count * horizon_days`, one f64 per simulated day. Products that don't fit in an
/// allocation are rejected here, any tighter limit is up to the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SimulationParams {
    path_count: usize,
    horizon_days: usize,
}

impl SimulationParams {
    pub fn new(path_count: usize, horizon_days: usize) -> Result<Self, SimulationError> {
        if path_count == 0 {
            return Err(SimulationError::InvalidParameter {
                name: "path_count",
                value: path_count,
            });
        }
        if horizon_days == 0 {
            return Err(SimulationError::InvalidParameter {
                name: "horizon_days",
                value: horizon_days,
            });
        }
        path_count
            .checked_mul(horizon_days)
            .filter(|&cells| cells <= isize::MAX as usize / std::mem::size_of::<f64>())
            .ok_or(SimulationError::Oversized {
                path_count,
                horizon_days,
            })?;
        Ok(SimulationParams {
            path_count,
            horizon_days,
        })
    }

    /// Number of simulated prices, `path_count * horizon_days`
    pub fn cells(&self) -> usize {
        self.path_count * self.horizon_days
    }

    pub fn path_count(&self) -> usize {
        self.path_count
    }

    pub fn horizon_days(&self) -> usize {
        self.horizon_days
    }
}

/// Simulated prices, one row per path and one column per day
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatrix {
    horizon_days: usize,
    // row-major
    values: Vec<f64>,
}

impl PathMatrix {
    pub fn path_count(&self) -> usize {
        self.values.len() / self.horizon_days
    }

    pub fn horizon_days(&self) -> usize {
        self.horizon_days
    }

    pub fn path(&self, index: usize) -> Option<&[f64]> {
        self.paths().nth(index)
    }

    pub fn paths(&self) -> std::slice::Chunks<'_, f64> {
        self.values.chunks(self.horizon_days)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The price on the last simulated day of every path
    pub fn terminal_values(&self) -> Vec<f64> {
        self.paths().filter_map(|path| path.last().copied()).collect()
    }
}

// the presentation layer wants one array per path
impl Serialize for PathMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.paths())
    }
}

/// Everything a simulation run hands back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    pub last_price: f64,
    pub volatility: f64,
    pub value_at_risk: f64,
    pub paths: PathMatrix,
}

/// Day-over-day fractional changes, one fewer than there are closes
pub fn daily_returns(history: &PriceSeries) -> Vec<f64> {
    history
        .observations()
        .windows(2)
        .map(|pair| pair[1].close / pair[0].close - 1.0)
        .collect()
}

/// Population standard deviation, None when there is nothing to measure
pub fn volatility(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// Percentile `q` (0 to 100) with linear interpolation between the closest ranks
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64))
}

/// Last close minus the 5th percentile of the terminal prices
pub fn value_at_risk(last_price: f64, terminal_values: &[f64]) -> Option<f64> {
    Some(last_price - percentile(terminal_values, VAR_PERCENTILE)?)
}

// last close and volatility, the two numbers every path starts from
fn estimate(history: &PriceSeries) -> Result<(f64, f64), SimulationError> {
    let returns = daily_returns(history);
    match (history.last_close(), volatility(&returns)) {
        (Some(last_price), Some(sigma)) => Ok((last_price, sigma)),
        _ => Err(SimulationError::InsufficientData {
            observations: history.len(),
        }),
    }
}

// each day depends on the one before it, so a single path is always walked in order
fn walk<R: Rng>(start: f64, sigma: f64, rng: &mut R, path: &mut [f64]) {
    let normal = Normal::standard();
    let mut price = start;
    for day in path.iter_mut() {
        price *= 1.0 + sigma * normal.sample(rng);
        *day = price;
    }
}

// every path gets its own stream of the same seed, so the draws don't depend on which thread walks it
fn path_rng(seed: u64, index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    rng
}

fn assemble(
    last_price: f64,
    sigma: f64,
    horizon_days: usize,
    values: Vec<f64>,
) -> Result<Simulation, SimulationError> {
    let paths = PathMatrix {
        horizon_days,
        values,
    };
    let terminal_values = paths.terminal_values();
    let value_at_risk = value_at_risk(last_price, &terminal_values).ok_or(
        SimulationError::InvalidParameter {
            name: "path_count",
            value: terminal_values.len(),
        },
    )?;
    Ok(Simulation {
        last_price,
        volatility: sigma,
        value_at_risk,
        paths,
    })
}

/// Walks every path with draws from the one generator it is given, path after path
pub fn simulate<R: Rng>(
    history: &PriceSeries,
    params: SimulationParams,
    rng: &mut R,
) -> Result<Simulation, SimulationError> {
    let (last_price, sigma) = estimate(history)?;
    log::debug!(
        "simulating {} paths over {} days from {} with sigma {:.6}",
        params.path_count,
        params.horizon_days,
        last_price,
        sigma
    );
    let mut values = vec![0.0; params.cells()];
    for path in values.chunks_mut(params.horizon_days) {
        walk(last_price, sigma, rng, path);
    }
    assemble(last_price, sigma, params.horizon_days, values)
}

/// Walks every path on its own generator derived from `seed`, one path after the other
pub fn simulate_seeded(
    history: &PriceSeries,
    params: SimulationParams,
    seed: u64,
) -> Result<Simulation, SimulationError> {
    let (last_price, sigma) = estimate(history)?;
    let mut values = vec![0.0; params.cells()];
    for (index, path) in values.chunks_mut(params.horizon_days).enumerate() {
        walk(last_price, sigma, &mut path_rng(seed, index), path);
    }
    assemble(last_price, sigma, params.horizon_days, values)
}

/// Same paths as [`simulate_seeded`], spread over the rayon thread pool
pub fn simulate_parallel(
    history: &PriceSeries,
    params: SimulationParams,
    seed: u64,
) -> Result<Simulation, SimulationError> {
    let (last_price, sigma) = estimate(history)?;
    log::debug!(
        "simulating {} paths over {} days in parallel, seed {}, sigma {:.6}",
        params.path_count,
        params.horizon_days,
        seed,
        sigma
    );
    let mut values = vec![0.0; params.cells()];
    values
        .par_chunks_mut(params.horizon_days)
        .enumerate()
        .for_each(|(index, path)| walk(last_price, sigma, &mut path_rng(seed, index), path));
    assemble(last_price, sigma, params.horizon_days, values)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    use super::*;

    fn history(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| (start + Duration::days(i as i64), c))
                .collect(),
        )
        .unwrap()
    }

    fn params(paths: usize, days: usize) -> SimulationParams {
        SimulationParams::new(paths, days).unwrap()
    }

    #[test]
    fn constant_history_gives_flat_paths_and_no_risk() {
        let flat = history(&[42.0; 10]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for simulation in [
            simulate(&flat, params(50, 20), &mut rng).unwrap(),
            simulate_seeded(&flat, params(50, 20), 1).unwrap(),
            simulate_parallel(&flat, params(50, 20), 1).unwrap(),
        ] {
            assert_eq!(simulation.volatility, 0.0);
            assert!(simulation.paths.values().iter().all(|&p| p == 42.0));
            assert_eq!(simulation.value_at_risk, 0.0);
        }
    }

    #[test]
    fn matrix_has_requested_shape() {
        let h = history(&[100.0, 101.0, 99.0, 100.5, 102.0, 101.2]);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let simulation = simulate(&h, params(200, 30), &mut rng).unwrap();
        assert_eq!(simulation.paths.path_count(), 200);
        assert_eq!(simulation.paths.horizon_days(), 30);
        assert_eq!(simulation.paths.values().len(), 6000);
        assert!(simulation.paths.paths().all(|p| p.len() == 30));
        assert!(simulation.paths.values().iter().all(|&p| p > 0.0));
        assert_eq!(simulation.last_price, 101.2);
        assert_eq!(simulation.paths.path(200), None);
    }

    #[test]
    fn same_seed_gives_identical_paths() {
        let h = history(&[10.0, 10.2, 10.1, 10.4, 10.3]);
        let first = simulate(&h, params(100, 60), &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        let second = simulate(&h, params(100, 60), &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(first, second);

        let other = simulate(&h, params(100, 60), &mut ChaCha8Rng::seed_from_u64(8)).unwrap();
        assert_ne!(first.paths, other.paths);
    }

    #[test]
    fn parallel_matches_sequential() {
        let h = history(&[55.0, 54.1, 56.3, 57.0, 55.8, 56.1]);
        let sequential = simulate_seeded(&h, params(1000, 90), 2024).unwrap();
        let parallel = simulate_parallel(&h, params(1000, 90), 2024).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn paths_are_independent_streams() {
        let h = history(&[55.0, 54.1, 56.3]);
        let simulation = simulate_seeded(&h, params(3, 10), 5).unwrap();
        assert_ne!(simulation.paths.path(0), simulation.paths.path(1));
        assert_ne!(simulation.paths.path(1), simulation.paths.path(2));
    }

    #[test]
    fn population_volatility() {
        // returns are +10% and -10%
        let h = history(&[100.0, 110.0, 99.0]);
        let returns = daily_returns(&h);
        assert_eq!(returns.len(), 2);
        assert_relative_eq!(returns[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns[1], -0.1, epsilon = 1e-12);
        assert_relative_eq!(volatility(&returns).unwrap(), 0.1, epsilon = 1e-12);
        assert_eq!(volatility(&[]), None);
        assert_eq!(volatility(&[0.3]), Some(0.0));
    }

    #[test]
    fn interpolated_percentile() {
        let terminals: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_relative_eq!(percentile(&terminals, 5.0).unwrap(), 1.45, epsilon = 1e-12);
        assert_relative_eq!(value_at_risk(12.0, &terminals).unwrap(), 10.55, epsilon = 1e-12);

        let shuffled = [7.0, 3.0, 10.0, 1.0, 5.0, 2.0, 9.0, 4.0, 8.0, 6.0];
        assert_relative_eq!(percentile(&shuffled, 5.0).unwrap(), 1.45, epsilon = 1e-12);

        assert_eq!(percentile(&terminals, 0.0), Some(1.0));
        assert_eq!(percentile(&terminals, 100.0), Some(10.0));
        assert_eq!(percentile(&[3.0], 5.0), Some(3.0));
        assert_eq!(percentile(&[], 5.0), None);
        assert_eq!(percentile(&terminals, 101.0), None);
    }

    #[test]
    fn value_at_risk_can_be_negative() {
        let var = value_at_risk(1.0, &[2.0, 3.0, 4.0]).unwrap();
        assert!(var < 0.0);
    }

    #[test]
    fn needs_two_prices() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            simulate(&history(&[]), params(10, 10), &mut rng),
            Err(SimulationError::InsufficientData { observations: 0 })
        );
        assert_eq!(
            simulate_seeded(&history(&[5.0]), params(10, 10), 0),
            Err(SimulationError::InsufficientData { observations: 1 })
        );
        assert_eq!(
            simulate_parallel(&history(&[5.0]), params(10, 10), 0),
            Err(SimulationError::InsufficientData { observations: 1 })
        );
        let two = simulate(&history(&[5.0, 5.1]), params(10, 10), &mut rng).unwrap();
        assert_eq!(two.volatility, 0.0);
        assert_eq!(two.value_at_risk, 0.0);
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert_eq!(
            SimulationParams::new(0, 30),
            Err(SimulationError::InvalidParameter {
                name: "path_count",
                value: 0
            })
        );
        assert_eq!(
            SimulationParams::new(200, 0),
            Err(SimulationError::InvalidParameter {
                name: "horizon_days",
                value: 0
            })
        );
        let single = params(1, 1);
        assert_eq!((single.path_count(), single.horizon_days()), (1, 1));
        assert_eq!(params(200, 30).cells(), 6000);
    }

    #[test]
    fn rejects_dimensions_that_overflow() {
        assert_eq!(
            SimulationParams::new(usize::MAX / 2 + 1, 2),
            Err(SimulationError::Oversized {
                path_count: usize::MAX / 2 + 1,
                horizon_days: 2
            })
        );
        // fits in a usize but not in one allocation of f64s
        assert!(matches!(
            SimulationParams::new(usize::MAX / 16, 2),
            Err(SimulationError::Oversized { .. })
        ));
        assert!(SimulationParams::new(usize::MAX / 16, 1).is_ok());
    }

    #[test]
    fn serializes_one_array_per_path() {
        let simulation = simulate_seeded(&history(&[3.0, 3.0]), params(2, 3), 0).unwrap();
        let json = serde_json::to_value(&simulation).unwrap();
        assert_eq!(json["paths"], serde_json::json!([[3.0, 3.0, 3.0], [3.0, 3.0, 3.0]]));
        assert_eq!(json["value_at_risk"], serde_json::json!(0.0));
    }

    proptest! {
        #[test]
        fn shape_and_reproducibility_hold_for_any_calm_history(
            moves in prop::collection::vec(-0.03f64..0.03, 1..40),
            paths in 1usize..60,
            days in 1usize..40,
            seed in any::<u64>(),
        ) {
            let mut closes = vec![100.0];
            for m in &moves {
                let next = closes[closes.len() - 1] * (1.0 + m);
                closes.push(next);
            }
            let h = history(&closes);
            let sequential = simulate_seeded(&h, params(paths, days), seed).unwrap();
            let parallel = simulate_parallel(&h, params(paths, days), seed).unwrap();
            prop_assert_eq!(&sequential, &parallel);
            prop_assert_eq!(sequential.paths.path_count(), paths);
            prop_assert_eq!(sequential.paths.horizon_days(), days);
            prop_assert!(sequential.paths.values().iter().all(|&p| p > 0.0));
        }
    }
}
