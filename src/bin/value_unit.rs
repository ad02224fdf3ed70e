// src/bin/value_unit.rs
// Usage: value_unit <transactions.csv> <project> <size_sqft> [floor]
use anyhow::{anyhow, bail, Context, Result};
use dotenv::dotenv;
use log::info;
use std::env;
use std::path::PathBuf;

use property_dashboard_cma::config::Config;
use property_dashboard_cma::models::FilterSpec;
use property_dashboard_cma::services::engine::ValuationEngine;
use property_dashboard_cma::services::loader::load_transactions_file;
use property_dashboard_cma::services::store::slug;

fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        bail!("usage: {} <transactions.csv> <project> <size_sqft> [floor]", args[0]);
    }
    let path = PathBuf::from(&args[1]);
    let project = &args[2];
    let size: f64 = args[3].parse().with_context(|| format!("size '{}' is not a number", args[3]))?;
    let floor: Option<f64> = args
        .get(4)
        .map(|f| f.parse::<f64>().with_context(|| format!("floor '{}' is not a number", f)))
        .transpose()?;

    let config = Config::from_env()?;
    let projects = load_transactions_file(&path)?;
    let (name, transactions) = projects
        .into_iter()
        .find(|(name, _)| slug(name) == slug(project))
        .ok_or_else(|| anyhow!("project '{}' not found in {}", project, path.display()))?;

    let engine = ValuationEngine::at_wall_clock(name, transactions, 1, config.market_tz);
    info!("Valuing {} sqft on floor {:?} in {} as of {}", size, floor, engine.project(), engine.now());

    let spec = FilterSpec::default();
    let tiers = engine.tier_estimates(&spec, Some(size), floor);
    let cagr = engine.bucket_cagr(&spec, None, None);
    let floors = engine.floor_premiums(&spec);

    println!("Project:        {}", engine.project());
    match &tiers.best {
        Some(best) => println!("Best estimate:  {} psf ({:?}, {:?}, {} sales)", best.psf, best.tier, best.window, best.count),
        None => println!("Best estimate:  no sales in the last 12 months"),
    }
    match cagr.cagr_percent {
        Some(rate) => println!(
            "CAGR:           {:.2}% ({:?}-{:?}){}",
            rate,
            cagr.start_year,
            cagr.end_year,
            if cagr.low_confidence { " [low confidence]" } else { "" }
        ),
        None => println!("CAGR:           not enough yearly data"),
    }
    for band in &floors.bands {
        println!(
            "Floor {:>6}:   {} psf, {:+.1}% ({} sales){}",
            band.band.label(),
            band.psf,
            band.premium_percent,
            band.count,
            if band.is_thin { " [thin]" } else { "" }
        );
    }

    match engine.valuation_model(&spec, size, floor) {
        Some(model) => {
            println!(
                "Valuation:      {} psf (range {} - {}), confidence {}/100",
                model.estimated_psf, model.low_psf, model.high_psf, model.confidence
            );
            println!("Total price:    {:.0}", model.estimated_psf * size);
            println!("{}", serde_json::to_string_pretty(&model)?);
        }
        None => println!("Valuation:      not enough data"),
    }
    Ok(())
}
