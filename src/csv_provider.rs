use crate::instrument::{CompanySnapshot, InstrumentReference};
use crate::instrument_code::InstrumentCode;
use crate::observation::{DataProvider, DataProviderError, Observation};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Volatility series: `ts_code,trade_date,std`
pub const VOLATILITY_FILE: &str = "daily_std_data.csv";
/// Directory of split volume files: `ts_code,trade_date,vol`
pub const VOLUME_DIR: &str = "daily_vol_data";
/// Static reference: `ts_code,name,list_date,industry` (extra columns ignored)
pub const REFERENCE_FILE: &str = "stock_basic.csv";
/// Directory of company-data partitions: `ts_code,trade_date,total_mv`
pub const COMPANY_DATA_DIR: &str = "daily_company_data";
/// The company-data partition holding the most recent dates.
pub const RECENT_PARTITION: &str = "1.csv";

/// CSV-backed data provider.
///
/// Large datasets are stored as several CSV files in one directory; they are
/// read in file-name order and concatenated. Every call re-reads the files.
#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    root: PathBuf,
}

impl CsvDataProvider {
    /// Creates a provider reading from `root`.
    ///
    /// # Errors
    /// Returns `MissingDataset` if `root` is not a directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, DataProviderError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DataProviderError::MissingDataset(root.display().to_string()));
        }
        Ok(CsvDataProvider { root })
    }

    fn read_file<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, DataProviderError> {
        if !path.is_file() {
            return Err(DataProviderError::MissingDataset(path.display().to_string()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
        log::debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    fn read_split_dir<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>, DataProviderError> {
        if !dir.is_dir() {
            return Err(DataProviderError::MissingDataset(dir.display().to_string()));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();

        if files.is_empty() {
            log::warn!("No CSV files found in {}", dir.display());
        }

        let mut rows = Vec::new();
        for file in &files {
            rows.extend(self.read_file::<T>(file)?);
        }
        log::info!(
            "Loaded {} rows from {} files in {}",
            rows.len(),
            files.len(),
            dir.display()
        );
        Ok(rows)
    }
}

impl DataProvider for CsvDataProvider {
    fn volatility_observations(&self) -> Result<Vec<Observation>, DataProviderError> {
        self.read_file(&self.root.join(VOLATILITY_FILE))
    }

    fn volume_observations(&self) -> Result<Vec<Observation>, DataProviderError> {
        self.read_split_dir(&self.root.join(VOLUME_DIR))
    }

    fn static_reference(
        &self,
    ) -> Result<HashMap<InstrumentCode, InstrumentReference>, DataProviderError> {
        let rows: Vec<InstrumentReference> = self.read_file(&self.root.join(REFERENCE_FILE))?;
        Ok(rows.into_iter().map(|row| (row.code.clone(), row)).collect())
    }

    fn recent_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        let path = self.root.join(COMPANY_DATA_DIR).join(RECENT_PARTITION);
        if !path.is_file() {
            log::warn!("Recent company-data partition {} is missing", path.display());
            return Ok(Vec::new());
        }
        self.read_file(&path)
    }

    fn all_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        self.read_split_dir(&self.root.join(COMPANY_DATA_DIR))
    }
}
