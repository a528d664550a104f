use crate::instrument_code::InstrumentCode;
use crate::trade_date::serde_yyyymmdd;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Static, effectively time-invariant reference data for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentReference {
    /// Unique instrument code
    #[serde(rename = "ts_code")]
    pub code: InstrumentCode,
    /// Display name (e.g. "平安银行")
    pub name: String,
    /// Listing date, when known
    #[serde(with = "serde_yyyymmdd::option", default)]
    pub list_date: Option<NaiveDate>,
    /// Industry classification
    #[serde(default)]
    pub industry: Option<String>,
}

impl InstrumentReference {
    /// Creates a new reference record.
    pub fn new(
        code: InstrumentCode,
        name: impl Into<String>,
        list_date: Option<NaiveDate>,
        industry: Option<String>,
    ) -> Self {
        InstrumentReference {
            code,
            name: name.into(),
            list_date,
            industry,
        }
    }
}

/// Point-in-time company attributes for one instrument on one trade date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    #[serde(rename = "ts_code")]
    pub code: InstrumentCode,
    #[serde(with = "serde_yyyymmdd")]
    pub trade_date: NaiveDate,
    /// Total market value in the provider's raw unit (ten-thousands of yuan)
    #[serde(default)]
    pub total_mv: Option<f64>,
}

impl CompanySnapshot {
    pub fn new(code: InstrumentCode, trade_date: NaiveDate, total_mv: Option<f64>) -> Self {
        CompanySnapshot {
            code,
            trade_date,
            total_mv,
        }
    }

    /// Market value rescaled into display units.
    ///
    /// With the default divisor of 10,000 the raw ten-thousands unit becomes
    /// hundreds of millions.
    pub fn market_value(&self, divisor: f64) -> Option<f64> {
        self.total_mv.map(|value| value / divisor)
    }
}
