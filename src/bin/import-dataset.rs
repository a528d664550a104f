//! Copies a CSV dataset directory into a SQLite database for the
//! `DATA_BACKEND=sqlite` server mode.
//!
//! Run with: `DATA_DIR=data DATABASE_PATH=ratings.db cargo run --bin import-dataset`

use strength::{CsvDataProvider, RatingConfig, SqliteDataProvider};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let config = RatingConfig::from_env()?;
    let source = CsvDataProvider::new(&config.data_dir)?;
    let mut target = SqliteDataProvider::new(&config.database_path)?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        database = %config.database_path.display(),
        "importing datasets"
    );
    let written = target.import_from(&source)?;
    tracing::info!(rows = written, "import finished");

    Ok(())
}
