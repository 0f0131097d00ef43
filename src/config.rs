use chrono::NaiveDate;
use clap::Parser;

/// Market dashboard back end: Monte Carlo price paths, Value at Risk and portfolio trends
#[derive(Parser, Debug, Clone)]
#[command(name = "findash", version)]
pub struct Settings {
    /// Address to bind the HTTP server to
    #[arg(long, env = "FINDASH_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "FINDASH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Calendar days of history the volatility is estimated from
    #[arg(long, env = "FINDASH_HISTORY_DAYS", default_value_t = 180)]
    pub history_days: i64,

    /// First date of the price history charts when a request doesn't give one
    #[arg(long, env = "FINDASH_HISTORY_START", default_value = "2010-01-01")]
    pub history_start: NaiveDate,

    /// First date of the portfolio trend comparison
    #[arg(long, env = "FINDASH_PORTFOLIO_START", default_value = "2020-01-01")]
    pub portfolio_start: NaiveDate,

    /// Paths simulated when a request doesn't ask for a number
    #[arg(long, env = "FINDASH_DEFAULT_PATHS", default_value_t = 500)]
    pub default_paths: usize,

    /// Days simulated when a request doesn't ask for a horizon
    #[arg(long, env = "FINDASH_DEFAULT_HORIZON", default_value_t = 30)]
    pub default_horizon: usize,

    /// Upper bound on paths times horizon for a single simulation request
    #[arg(long, env = "FINDASH_MAX_CELLS", default_value_t = 5_000_000)]
    pub max_cells: usize,

    /// Exchange suffix added to bare tickers before asking yahoo! finance
    #[arg(long, env = "FINDASH_SYMBOL_SUFFIX", default_value = ".VN")]
    pub symbol_suffix: String,

    /// Seeded simulations kept in memory, 0 turns the cache off
    #[arg(long, env = "FINDASH_CACHE_CAPACITY", default_value_t = 64)]
    pub cache_capacity: usize,

    #[arg(short, long)]
    pub verbose: bool,
}
