// src/handlers/projects.rs
use log::{debug, info, warn};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::services::engine::ValuationEngine;
use crate::services::store::ProjectStore;
use super::error::ApiError;

pub async fn list_projects(store: Arc<ProjectStore>) -> Result<Json, Rejection> {
    info!("Handling request to list projects");
    let summaries = store.summaries().await;
    debug!("Listing {} projects at data version {}", summaries.len(), store.version());
    Ok(warp::reply::json(&summaries))
}

/// Engine for `project`, or a 404 rejection.
pub(crate) async fn engine_for(store: &ProjectStore, project: &str) -> Result<Arc<ValuationEngine>, Rejection> {
    store.get(project).await.ok_or_else(|| {
        warn!("Request for unknown project '{}'", project);
        warp::reject::custom(ApiError::not_found(format!("Unknown project '{}'", project)))
    })
}
