// src/services/mod.rs
pub mod calculations;
pub mod engine;
pub mod filters;
pub mod floor_premium;
pub mod loader;
pub mod scheduler;
pub mod store;
pub mod tiers;
pub mod valuation;
pub mod windows;
