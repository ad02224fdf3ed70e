// src/services/store.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use super::engine::ValuationEngine;
use super::loader::{load_transactions_file, ProjectTransactions};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub slug: String,
    pub transaction_count: usize,
    pub data_version: u64,
}

/// URL-safe key for a project name: `"The Crest"` becomes `"the-crest"`.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// One engine per project keyed by slug, swapped wholesale on reload.
#[derive(Default)]
pub struct ProjectStore {
    engines: RwLock<HashMap<String, Arc<ValuationEngine>>>,
    version: AtomicU64,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every engine with ones built from `projects`; returns the new data version.
    pub async fn replace(&self, projects: ProjectTransactions, now: NaiveDate) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let engines: HashMap<String, Arc<ValuationEngine>> = projects
            .into_iter()
            .map(|(name, txs)| {
                let key = slug(&name);
                (key, Arc::new(ValuationEngine::new(name, txs, version, now)))
            })
            .collect();

        let count = engines.len();
        *self.engines.write().await = engines;
        info!("Project store now at v{} with {} projects (now = {})", version, count, now);
        version
    }

    /// Looks a project up by slug or by its display name.
    pub async fn get(&self, project: &str) -> Option<Arc<ValuationEngine>> {
        self.engines.read().await.get(&slug(project)).cloned()
    }

    pub async fn summaries(&self) -> Vec<ProjectSummary> {
        let engines = self.engines.read().await;
        let mut list: Vec<ProjectSummary> = engines
            .iter()
            .map(|(key, e)| ProjectSummary {
                name: e.project().to_string(),
                slug: key.clone(),
                transaction_count: e.transaction_count(),
                data_version: e.data_version(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

/// Loads the configured CSV off the async runtime and swaps it into the store.
pub async fn reload_from_csv(store: &ProjectStore, config: &Config) -> Result<u64> {
    let path = config.transactions_csv.clone();
    let projects = tokio::task::spawn_blocking(move || load_transactions_file(&path))
        .await
        .context("Transaction loader task panicked")??;
    Ok(store.replace(projects, config.today()).await)
}
