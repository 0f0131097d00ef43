use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use findash::config::Settings;
use findash::server::{configure, AppState};
use findash::yahoo_finance::YahooProvider;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if settings.verbose { "debug" } else { "info" }),
    )
    .init();

    log::info!("serving on {}:{}", settings.host, settings.port);
    log::info!(
        "defaults: {} paths over {} days, {} days of history",
        settings.default_paths,
        settings.default_horizon,
        settings.history_days
    );

    let bind = (settings.host.clone(), settings.port);
    let provider = YahooProvider::new(settings.symbol_suffix.clone());
    // an arc because the state is shared by every worker
    let state = web::Data::new(AppState::new(provider, settings));
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure::<YahooProvider>)
    })
    .bind(bind)?
    .run()
    .await
}
