// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use log::warn;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_TRANSACTIONS_CSV: &str = "transactions.csv";
pub const DEFAULT_MARKET_TZ: &str = "Asia/Singapore";
/// sec min hour day month weekday: 03:00 every day
pub const DEFAULT_RELOAD_CRON: &str = "0 0 3 * * *";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub transactions_csv: PathBuf,
    pub market_tz: Tz,
    pub reload_cron: String,
}

impl Config {
    /// Reads the environment. Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a number, got '{}'", raw))?,
            Err(_) => {
                warn!("$PORT not set, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let transactions_csv = env::var("TRANSACTIONS_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TRANSACTIONS_CSV));

        let tz_name = env::var("MARKET_TZ").unwrap_or_else(|_| DEFAULT_MARKET_TZ.to_string());
        let market_tz = parse_tz(&tz_name)?;

        let reload_cron = env::var("RELOAD_CRON").unwrap_or_else(|_| DEFAULT_RELOAD_CRON.to_string());

        Ok(Self {
            port,
            transactions_csv,
            market_tz,
            reload_cron,
        })
    }

    /// Current calendar date in the market's time zone.
    pub fn today(&self) -> NaiveDate {
        today_in(self.market_tz)
    }
}

pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

pub fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow!("MARKET_TZ '{}' is not a valid time zone: {}", name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_market_time_zones() {
        assert_eq!(parse_tz("Asia/Singapore").unwrap(), chrono_tz::Asia::Singapore);
        assert!(parse_tz("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn today_follows_the_configured_zone() {
        let config = Config {
            port: DEFAULT_PORT,
            transactions_csv: PathBuf::from(DEFAULT_TRANSACTIONS_CSV),
            market_tz: chrono_tz::Pacific::Kiritimati,
            reload_cron: DEFAULT_RELOAD_CRON.to_string(),
        };
        // UTC+14 is never behind UTC
        assert!(config.today() >= Utc::now().date_naive());
    }
}
