// src/handlers/valuation.rs
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::models::{all_as_none, FilterSpec, YearMonth};
use crate::services::store::ProjectStore;
use super::error::ApiError;
use super::projects::engine_for;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetQuery {
    #[serde(default, deserialize_with = "all_as_none")]
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub floor: Option<f64>,
    #[serde(flatten)]
    pub filters: FilterSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAdjustQuery {
    #[serde(default, deserialize_with = "all_as_none")]
    pub psf: Option<f64>,
    #[serde(default, deserialize_with = "all_as_none")]
    pub date: Option<YearMonth>,
    #[serde(flatten)]
    pub filters: FilterSpec,
}

fn positive(name: &str, value: Option<f64>) -> Result<Option<f64>, Rejection> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => Err(warp::reject::custom(ApiError::bad_request(format!(
            "{} must be a positive number",
            name
        )))),
        other => Ok(other),
    }
}

fn finite(name: &str, value: Option<f64>) -> Result<Option<f64>, Rejection> {
    match value {
        Some(v) if !v.is_finite() => Err(warp::reject::custom(ApiError::bad_request(format!(
            "{} must be a finite number",
            name
        )))),
        other => Ok(other),
    }
}

fn required<T>(name: &str, value: Option<T>) -> Result<T, Rejection> {
    value.ok_or_else(|| warp::reject::custom(ApiError::bad_request(format!("Missing required parameter '{}'", name))))
}

pub async fn get_tiers(project: String, query: TargetQuery, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request for {} tier estimates (size {:?}, floor {:?})", project, query.size, query.floor);
    let size = positive("size", query.size)?;
    let floor = finite("floor", query.floor)?;
    let engine = engine_for(&store, &project).await?;
    Ok(warp::reply::json(&engine.tier_estimates(&query.filters, size, floor)))
}

pub async fn get_time_adjust(project: String, query: TimeAdjustQuery, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request to time-adjust {:?} psf from {:?} for {}", query.psf, query.date, project);
    let psf = required("psf", positive("psf", query.psf)?)?;
    let date = required("date", query.date)?;
    let engine = engine_for(&store, &project).await?;
    let adjustment = engine.time_adjust(&query.filters, psf, date);
    if adjustment.rate_used.is_none() {
        warn!("No growth rate available for {}, psf returned unadjusted", project);
    }
    Ok(warp::reply::json(&adjustment))
}

pub async fn get_valuation(project: String, query: TargetQuery, store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request to value a {:?} sqft unit on floor {:?} in {}", query.size, query.floor, project);
    let size = required("size", positive("size", query.size)?)?;
    let floor = finite("floor", query.floor)?;
    let engine = engine_for(&store, &project).await?;
    let valuation = engine.valuation_model(&query.filters, size, floor);
    if valuation.is_none() {
        info!("Not enough comparables in {} for a valuation", project);
    }
    Ok(warp::reply::json(&json!({ "valuation": valuation })))
}
