//! Back end of a market dashboard
//!
//! The numeric core is two stateless pieces: [`simulation`] walks Monte-Carlo price paths forward from an
//! instrument's recent closes and measures the 95% Value at Risk of where they end, and [`normalize`] rescales
//! several instruments to a common baseline of 100 so their growth can be compared. Neither does any I/O.
//!
//! Around them sit the collaborators the dashboard needs: [`yahoo_finance`] fetches the quotes, [`history`] turns them
//! into chart candles with a moving average, [`cache`] memoizes seeded simulation runs and [`server`] serves all of
//! it as JSON.

pub mod cache;
pub mod config;
pub mod history;
pub mod normalize;
pub mod series;
pub mod server;
pub mod simulation;
pub mod yahoo_finance;
