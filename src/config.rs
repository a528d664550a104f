//! Rating configuration.

use crate::error::RatingError;
use crate::trade_date::serde_yyyymmdd;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Storage backend holding the datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBackend {
    /// CSV files under `data_dir`
    Csv,
    /// SQLite database at `database_path`
    Sqlite,
}

impl FromStr for DataBackend {
    type Err = RatingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(DataBackend::Csv),
            "sqlite" => Ok(DataBackend::Sqlite),
            other => Err(RatingError::InvalidParameter(format!(
                "unknown data backend '{}' (expected csv or sqlite)",
                other
            ))),
        }
    }
}

/// Settings shared by every rating computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Root directory of the CSV datasets
    pub data_dir: PathBuf,
    pub backend: DataBackend,
    /// SQLite database file, used when `backend` is `sqlite`
    pub database_path: PathBuf,
    /// The most recent company-data partition is trusted for a date only
    /// when it holds strictly more rows than this for that date.
    pub company_data_min_rows: usize,
    /// Raw market value is divided by this for display
    pub market_value_divisor: f64,
    pub c1_days: usize,
    pub past_days: usize,
    pub recent_days: usize,
    #[serde(with = "serde_yyyymmdd")]
    pub volatility_coverage_start: NaiveDate,
    #[serde(with = "serde_yyyymmdd")]
    pub volume_coverage_start: NaiveDate,
}

impl Default for RatingConfig {
    fn default() -> Self {
        RatingConfig {
            data_dir: PathBuf::from("data"),
            backend: DataBackend::Csv,
            database_path: PathBuf::from("ratings.db"),
            company_data_min_rows: 5300,
            market_value_divisor: 10_000.0,
            c1_days: 5,
            past_days: 20,
            recent_days: 5,
            volatility_coverage_start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            volume_coverage_start: NaiveDate::from_ymd_opt(2002, 1, 1).unwrap_or_default(),
        }
    }
}

impl RatingConfig {
    /// Builds a configuration from defaults overridden by environment variables.
    ///
    /// Recognized variables: `DATA_DIR`, `DATA_BACKEND`, `DATABASE_PATH`,
    /// `COMPANY_DATA_MIN_ROWS`, `MARKET_VALUE_DIVISOR`.
    ///
    /// # Errors
    /// Returns `InvalidParameter` when a variable is set but malformed.
    pub fn from_env() -> Result<Self, RatingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RatingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RatingConfig::default();

        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("DATA_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(rows) = lookup("COMPANY_DATA_MIN_ROWS") {
            config.company_data_min_rows = parse_var("COMPANY_DATA_MIN_ROWS", &rows)?;
        }
        if let Some(divisor) = lookup("MARKET_VALUE_DIVISOR") {
            config.market_value_divisor = parse_var("MARKET_VALUE_DIVISOR", &divisor)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the computations rely on.
    pub fn validate(&self) -> Result<(), RatingError> {
        if !(self.market_value_divisor.is_finite() && self.market_value_divisor > 0.0) {
            return Err(RatingError::InvalidParameter(
                "market_value_divisor must be a positive number".to_string(),
            ));
        }
        if self.c1_days == 0 || self.past_days == 0 || self.recent_days == 0 {
            return Err(RatingError::InvalidParameter(
                "default day counts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T, RatingError> {
    raw.trim().parse().map_err(|_| {
        RatingError::InvalidParameter(format!("{} has an invalid value '{}'", name, raw))
    })
}
