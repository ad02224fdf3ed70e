use dotenv::dotenv;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use property_dashboard_cma::config::Config;
use property_dashboard_cma::routes;
use property_dashboard_cma::services::scheduler::start_reload_job;
use property_dashboard_cma::services::store::{reload_from_csv, ProjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the valuation service...");

    let config = Config::from_env()?;
    info!(
        "Using PORT {}, transactions from {}, market time zone {}",
        config.port,
        config.transactions_csv.display(),
        config.market_tz
    );

    let store = Arc::new(ProjectStore::new());
    match reload_from_csv(&store, &config).await {
        Ok(version) => info!("Initial load complete, data version {}", version),
        Err(e) => {
            // Serve an empty store rather than refusing to start; the reload job may fill it later
            error!("Initial transaction load failed: {:#}", e);
            warn!("Starting with no projects loaded");
        }
    }

    // Keep the scheduler alive for the lifetime of the server
    let _scheduler = start_reload_job(store.clone(), config.clone()).await?;

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET"]);

    let api = routes::routes(store).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
