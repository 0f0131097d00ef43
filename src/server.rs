//! JSON endpoints for the dashboard
//!
//! - `GET /simulate/{ticker}?paths=500&horizon=30&seed=7` runs the Monte-Carlo simulation on the last months of
//!   closes and returns every path together with the 95% Value at Risk. Without a seed a random one is drawn and
//!   echoed back, so any run can be repeated. Runs with a seed chosen by the caller are cached.
//! - `GET /portfolio?tickers=FPT,VCB,HPG` returns every ticker's closes rescaled to start at 100, plus a warning
//!   for each ticker that couldn't be loaded.
//! - `GET /history/{ticker}?start=2024-01-01&end=2024-06-30` returns the daily candles of a date range, both ends
//!   included, with volume and the 50 day moving average of the close. The range defaults to everything from the
//!   configured history start until today.
//! - `GET /universe` lists the tickers the dashboard offers.
//! - `GET /choices` lists the path counts and horizons the dashboard offers, the defaults and the largest
//!   simulation a request may ask for.

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::{Datelike, NaiveDate, Utc};
use findash_derive::From;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use time::error::ComponentRange;
use time::{Date, Duration, Month, OffsetDateTime, Time};

use crate::cache::{CacheKey, SimulationCache};
use crate::config::Settings;
use crate::history::{candles, Candle};
use crate::normalize::normalize_fetched;
use crate::series::PriceSeries;
use crate::simulation::{
    simulate_parallel, Simulation, SimulationError, SimulationParams, HORIZON_CHOICES, PATH_COUNT_CHOICES,
};
use crate::yahoo_finance::{ProviderError, QuoteSource};

/// VN30 constituents
pub const UNIVERSE: [&str; 30] = [
    "ACB", "BCM", "BID", "BVH", "CTG", "FPT", "GAS", "GVR", "HDB", "HPG", "MBB", "MSN", "MWG", "PLX", "POW",
    "SAB", "SSB", "SSI", "STB", "TCB", "TPB", "VCB", "VHM", "VIB", "VIC", "VJC", "VNM", "VPB", "VRE", "SHB",
];

pub const DEFAULT_PORTFOLIO: [&str; 3] = ["FPT", "VCB", "HPG"];

/// Everything the handlers share
pub struct AppState<P> {
    pub provider: P,
    pub settings: Settings,
    pub cache: SimulationCache,
}

impl<P: QuoteSource> AppState<P> {
    pub fn new(provider: P, settings: Settings) -> AppState<P> {
        AppState {
            provider,
            cache: SimulationCache::new(settings.cache_capacity),
            settings,
        }
    }
}

#[derive(Error, Debug)]
#[error("{cells} simulated prices exceed the limit of {max_cells} per request")]
pub struct LimitError {
    cells: usize,
    max_cells: usize,
}

#[derive(Error, Debug)]
#[error("start {start} is after end {end}")]
pub struct RangeError {
    start: NaiveDate,
    end: NaiveDate,
}

/// Uses the custom derive macro From to convert every wrapped error into its variant
#[derive(Error, Debug, From)]
pub enum ApiError {
    #[error(transparent)]
    Simulation(SimulationError),
    #[error(transparent)]
    Limit(LimitError),
    #[error(transparent)]
    Range(RangeError),
    #[error(transparent)]
    Provider(ProviderError),
    #[error("date out of range: {0}")]
    DateRange(ComponentRange),
    #[error("simulation worker failed: {0}")]
    Blocking(BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Simulation(_) | ApiError::Limit(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Range(_) | ApiError::DateRange(_) => StatusCode::BAD_REQUEST,
            ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    paths: Option<usize>,
    horizon: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SimulationReport<'a> {
    ticker: &'a str,
    seed: u64,
    path_count: usize,
    horizon_days: usize,
    #[serde(flatten)]
    simulation: &'a Simulation,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioQuery {
    tickers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct HistoryReport {
    ticker: String,
    start: NaiveDate,
    end: NaiveDate,
    points: Vec<Candle>,
}

// midnight UTC of a calendar date
fn start_of_day(date: NaiveDate) -> Result<OffsetDateTime, ComponentRange> {
    let month = Month::try_from(date.month() as u8)?;
    Ok(OffsetDateTime::new_utc(
        Date::from_calendar_date(date.year(), month, date.day() as u8)?,
        Time::MIDNIGHT,
    ))
}

async fn simulate<P: QuoteSource + 'static>(
    state: web::Data<AppState<P>>,
    ticker: web::Path<String>,
    query: web::Query<SimulateQuery>,
) -> Result<HttpResponse, ApiError> {
    let ticker = ticker.into_inner().to_uppercase();
    let params = SimulationParams::new(
        query.paths.unwrap_or(state.settings.default_paths),
        query.horizon.unwrap_or(state.settings.default_horizon),
    )?;
    if params.cells() > state.settings.max_cells {
        return Err(LimitError {
            cells: params.cells(),
            max_cells: state.settings.max_cells,
        }
        .into());
    }
    let seed = query.seed.unwrap_or_else(rand::random);
    let key = CacheKey {
        instrument: ticker.clone(),
        as_of: Utc::now().date_naive(),
        params,
        seed,
    };
    let simulation = match query.seed.and_then(|_| state.cache.get(&key)) {
        Some(hit) => {
            log::debug!("{ticker}: serving seed {seed} from cache");
            hit
        }
        None => {
            let end = OffsetDateTime::now_utc();
            let start = end - Duration::days(state.settings.history_days);
            // nothing to fetch is the same as not enough to simulate
            let history = match state.provider.price_series(&ticker, &start, &end).await {
                Err(ProviderError::EmptyDataSet) => PriceSeries::default(),
                fetched => fetched?,
            };
            let simulation = web::block(move || simulate_parallel(&history, params, seed)).await??;
            if query.seed.is_some() {
                state.cache.insert(key, simulation)
            } else {
                Arc::new(simulation)
            }
        }
    };
    log::info!(
        "{ticker}: VaR 95% over {} days = {:.2}",
        params.horizon_days(),
        simulation.value_at_risk
    );
    Ok(HttpResponse::Ok().json(SimulationReport {
        ticker: &ticker,
        seed,
        path_count: simulation.paths.path_count(),
        horizon_days: simulation.paths.horizon_days(),
        simulation: &simulation,
    }))
}

async fn portfolio<P: QuoteSource + 'static>(
    state: web::Data<AppState<P>>,
    query: web::Query<PortfolioQuery>,
) -> Result<HttpResponse, ApiError> {
    let tickers: Vec<String> = match &query.tickers {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_uppercase)
            .collect(),
        None => DEFAULT_PORTFOLIO.iter().map(|t| t.to_string()).collect(),
    };
    let start = start_of_day(state.settings.portfolio_start)?;
    let end = OffsetDateTime::now_utc();
    let mut fetched = BTreeMap::new();
    for ticker in tickers {
        let series = state.provider.price_series(&ticker, &start, &end).await;
        fetched.insert(ticker, series);
    }
    Ok(HttpResponse::Ok().json(normalize_fetched(fetched)))
}

async fn history<P: QuoteSource + 'static>(
    state: web::Data<AppState<P>>,
    ticker: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let ticker = ticker.into_inner().to_uppercase();
    let start = query.start.unwrap_or(state.settings.history_start);
    let end = query.end.unwrap_or_else(|| Utc::now().date_naive());
    if start > end {
        return Err(RangeError { start, end }.into());
    }
    // the end day itself is part of the range
    let quotes = match state
        .provider
        .quotes(&ticker, &start_of_day(start)?, &(start_of_day(end)? + Duration::days(1)))
        .await
    {
        Err(ProviderError::EmptyDataSet) => Vec::new(),
        fetched => fetched?,
    };
    let points = candles(&quotes)?;
    log::debug!("{ticker}: {} candles from {start} to {end}", points.len());
    Ok(HttpResponse::Ok().json(HistoryReport {
        ticker,
        start,
        end,
        points,
    }))
}

async fn universe() -> HttpResponse {
    HttpResponse::Ok().json(UNIVERSE)
}

async fn choices<P: QuoteSource + 'static>(state: web::Data<AppState<P>>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "path_counts": PATH_COUNT_CHOICES,
        "horizons": HORIZON_CHOICES,
        "default_paths": state.settings.default_paths,
        "default_horizon": state.settings.default_horizon,
        "max_cells": state.settings.max_cells,
    }))
}

pub fn configure<P: QuoteSource + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/simulate/{ticker}", web::get().to(simulate::<P>))
        .route("/portfolio", web::get().to(portfolio::<P>))
        .route("/history/{ticker}", web::get().to(history::<P>))
        .route("/universe", web::get().to(universe))
        .route("/choices", web::get().to(choices::<P>));
}
