use crate::instrument::{CompanySnapshot, InstrumentReference};
use crate::instrument_code::InstrumentCode;
use crate::trade_date::serde_yyyymmdd;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A single daily observation of one quantity for one instrument.
///
/// The CSV column holding the value is `std` for volatility datasets and
/// `vol` for volume datasets; both deserialize into `value`. An empty cell
/// reads as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "ts_code")]
    pub code: InstrumentCode,
    #[serde(with = "serde_yyyymmdd")]
    pub trade_date: NaiveDate,
    #[serde(alias = "std", alias = "vol", deserialize_with = "value_or_nan")]
    pub value: f64,
}

fn value_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl Observation {
    /// Creates a new Observation.
    pub fn new(code: InstrumentCode, trade_date: NaiveDate, value: f64) -> Self {
        Observation {
            code,
            trade_date,
            value,
        }
    }
}

/// Which observed quantity a series holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    /// Daily standard deviation of returns
    Volatility,
    /// Daily traded volume (lots)
    Volume,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Volatility => "volatility",
            ObservationKind::Volume => "volume",
        }
    }
}

/// Source of every dataset the ratings consume.
///
/// Implementations return fresh, owned snapshots; callers never mutate
/// what they receive and nothing is cached between calls.
pub trait DataProvider {
    /// Daily volatility observations (coverage from early 2023).
    fn volatility_observations(&self) -> Result<Vec<Observation>, DataProviderError>;

    /// Daily volume observations (coverage from early 2002).
    fn volume_observations(&self) -> Result<Vec<Observation>, DataProviderError>;

    /// Static reference attributes keyed by instrument code.
    fn static_reference(
        &self,
    ) -> Result<HashMap<InstrumentCode, InstrumentReference>, DataProviderError>;

    /// Rows of the most recent company-data partition only.
    fn recent_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError>;

    /// Rows of every company-data partition, concatenated.
    fn all_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError>;

    /// Observations of the requested kind.
    fn observations(&self, kind: ObservationKind) -> Result<Vec<Observation>, DataProviderError> {
        match kind {
            ObservationKind::Volatility => self.volatility_observations(),
            ObservationKind::Volume => self.volume_observations(),
        }
    }
}

/// Errors that can occur when loading datasets.
#[derive(Debug, Error)]
pub enum DataProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("SQL error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("dataset not found: {0}")]
    MissingDataset(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// In-memory data provider, mainly for tests and embedding.
///
/// Company-data partitions are kept in recency order: index 0 is the most
/// recent partition.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataProvider {
    volatility: Vec<Observation>,
    volume: Vec<Observation>,
    reference: HashMap<InstrumentCode, InstrumentReference>,
    company_partitions: Vec<Vec<CompanySnapshot>>,
}

impl InMemoryDataProvider {
    /// Creates a new empty in-memory data provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends observations of the given kind.
    pub fn add_observations(&mut self, kind: ObservationKind, observations: Vec<Observation>) {
        match kind {
            ObservationKind::Volatility => self.volatility.extend(observations),
            ObservationKind::Volume => self.volume.extend(observations),
        }
    }

    /// Inserts or replaces a reference record.
    pub fn add_reference(&mut self, reference: InstrumentReference) {
        self.reference.insert(reference.code.clone(), reference);
    }

    /// Appends a company-data partition older than every partition added so far.
    pub fn add_company_partition(&mut self, rows: Vec<CompanySnapshot>) {
        self.company_partitions.push(rows);
    }
}

impl DataProvider for InMemoryDataProvider {
    fn volatility_observations(&self) -> Result<Vec<Observation>, DataProviderError> {
        Ok(self.volatility.clone())
    }

    fn volume_observations(&self) -> Result<Vec<Observation>, DataProviderError> {
        Ok(self.volume.clone())
    }

    fn static_reference(
        &self,
    ) -> Result<HashMap<InstrumentCode, InstrumentReference>, DataProviderError> {
        Ok(self.reference.clone())
    }

    fn recent_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        Ok(self.company_partitions.first().cloned().unwrap_or_default())
    }

    fn all_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        Ok(self.company_partitions.iter().flatten().cloned().collect())
    }
}
