// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;
use log::{error, info};
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::market::{get_cagr, get_floor_premiums, get_time_windows, get_transactions, CagrQuery};
use crate::handlers::projects::list_projects;
use crate::handlers::valuation::{get_tiers, get_time_adjust, get_valuation, TargetQuery, TimeAdjustQuery};
use crate::models::FilterSpec;
use crate::services::store::ProjectStore;

// Recovery for our custom errors and malformed queries
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status_code();
        message = api_error.message.clone();
    } else if let Some(invalid) = err.find::<warp::reject::InvalidQuery>() {
        code = StatusCode::BAD_REQUEST;
        message = invalid.to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(store: Arc<ProjectStore>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let store_filter = warp::any().map(move || store.clone());

    let projects_route = warp::path!("api" / "v1" / "projects")
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(list_projects);

    let transactions_route = warp::path!("api" / "v1" / "projects" / String / "transactions")
        .and(warp::get())
        .and(warp::query::<FilterSpec>())
        .and(store_filter.clone())
        .and_then(get_transactions);

    let windows_route = warp::path!("api" / "v1" / "projects" / String / "windows")
        .and(warp::get())
        .and(warp::query::<FilterSpec>())
        .and(store_filter.clone())
        .and_then(get_time_windows);

    let tiers_route = warp::path!("api" / "v1" / "projects" / String / "tiers")
        .and(warp::get())
        .and(warp::query::<TargetQuery>())
        .and(store_filter.clone())
        .and_then(get_tiers);

    let cagr_route = warp::path!("api" / "v1" / "projects" / String / "cagr")
        .and(warp::get())
        .and(warp::query::<CagrQuery>())
        .and(store_filter.clone())
        .and_then(get_cagr);

    let time_adjust_route = warp::path!("api" / "v1" / "projects" / String / "time-adjust")
        .and(warp::get())
        .and(warp::query::<TimeAdjustQuery>())
        .and(store_filter.clone())
        .and_then(get_time_adjust);

    let floor_premiums_route = warp::path!("api" / "v1" / "projects" / String / "floor-premiums")
        .and(warp::get())
        .and(warp::query::<FilterSpec>())
        .and(store_filter.clone())
        .and_then(get_floor_premiums);

    let valuation_route = warp::path!("api" / "v1" / "projects" / String / "valuation")
        .and(warp::get())
        .and(warp::query::<TargetQuery>())
        .and(store_filter.clone())
        .and_then(get_valuation);

    info!("All routes configured successfully.");

    projects_route
        .or(transactions_route)
        .or(windows_route)
        .or(tiers_route)
        .or(cagr_route)
        .or(time_adjust_route)
        .or(floor_premiums_route)
        .or(valuation_route)
        .recover(handle_rejection)
}
