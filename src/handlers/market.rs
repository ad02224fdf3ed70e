// src/handlers/market.rs
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::models::{all_as_none, FilterSpec};
use crate::services::store::ProjectStore;
use super::projects::engine_for;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CagrQuery {
    #[serde(default, deserialize_with = "all_as_none")]
    pub start: Option<i32>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub end: Option<i32>,
    #[serde(flatten)]
    pub filters: FilterSpec,
}

pub async fn get_transactions(project: String, filters: FilterSpec, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request for {} transactions", project);
    let engine = engine_for(&store, &project).await?;
    let filtered = engine.filtered_transactions(&filters);
    debug!("Returning {} transactions (filtered: {})", filtered.transactions.len(), filtered.has_filters);
    Ok(warp::reply::json(&filtered))
}

pub async fn get_time_windows(project: String, filters: FilterSpec, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request for {} time windows", project);
    let engine = engine_for(&store, &project).await?;
    Ok(warp::reply::json(&engine.time_windows(&filters)))
}

pub async fn get_cagr(project: String, query: CagrQuery, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request for {} CAGR ({:?} to {:?})", project, query.start, query.end);
    let engine = engine_for(&store, &project).await?;
    let result = engine.bucket_cagr(&query.filters, query.start, query.end);
    debug!("CAGR {:?}%, low confidence: {}", result.cagr_percent, result.low_confidence);
    Ok(warp::reply::json(&result))
}

pub async fn get_floor_premiums(project: String, filters: FilterSpec, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request for {} floor premiums", project);
    let engine = engine_for(&store, &project).await?;
    Ok(warp::reply::json(&engine.floor_premiums(&filters)))
}
