//! Shared application state for the API server

use crate::config::{DataBackend, RatingConfig};
use crate::csv_provider::CsvDataProvider;
use crate::observation::{DataProvider, DataProviderError};
use crate::sqlite_provider::SqliteDataProvider;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Provider shared between requests.
pub type SharedProvider = Box<dyn DataProvider + Send>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Dataset source; wrapped in a Mutex because SQLite connections are not
    /// thread-safe
    pub provider: Arc<Mutex<SharedProvider>>,
    pub config: Arc<RatingConfig>,
}

impl AppState {
    pub fn new(provider: SharedProvider, config: RatingConfig) -> Self {
        AppState {
            provider: Arc::new(Mutex::new(provider)),
            config: Arc::new(config),
        }
    }

    /// Opens the provider selected by `config.backend`.
    pub fn open(config: RatingConfig) -> Result<Self, DataProviderError> {
        let provider: SharedProvider = match config.backend {
            DataBackend::Csv => Box::new(CsvDataProvider::new(&config.data_dir)?),
            DataBackend::Sqlite => {
                Box::new(SqliteDataProvider::open_read_only(&config.database_path)?)
            }
        };
        Ok(AppState::new(provider, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_missing_csv_root() {
        let config = RatingConfig {
            data_dir: "/definitely/not/here".into(),
            ..RatingConfig::default()
        };
        assert!(matches!(
            AppState::open(config),
            Err(DataProviderError::MissingDataset(_))
        ));
    }

    #[test]
    fn test_open_sqlite_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let database_path = dir.path().join("ratings.db");
        SqliteDataProvider::new(&database_path).unwrap();

        let config = RatingConfig {
            backend: DataBackend::Sqlite,
            database_path,
            ..RatingConfig::default()
        };
        assert!(AppState::open(config).is_ok());
    }

    #[test]
    fn test_open_sqlite_backend_requires_existing_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let database_path = dir.path().join("ratings.db");
        let config = RatingConfig {
            backend: DataBackend::Sqlite,
            database_path: database_path.clone(),
            ..RatingConfig::default()
        };
        assert!(matches!(
            AppState::open(config),
            Err(DataProviderError::MissingDataset(_))
        ));
        assert!(!database_path.exists());
    }
}
