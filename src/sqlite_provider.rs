use crate::instrument::{CompanySnapshot, InstrumentReference};
use crate::instrument_code::InstrumentCode;
use crate::observation::{DataProvider, DataProviderError, Observation, ObservationKind};
use crate::trade_date::{trade_date_from_int, trade_date_to_int};
use rusqlite::{params, Connection, OpenFlags, Result as SqliteResult, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Partition number of the most recent company data.
pub const RECENT_PARTITION: i64 = 1;

/// SQLite-based data provider implementation.
///
/// Stores observations, reference data and partitioned company data.
/// Dates are stored as `YYYYMMDD` integers and missing values as `NULL`.
/// Writable databases create their schema on first use; the server opens an
/// existing database read-only.
#[derive(Debug)]
pub struct SqliteDataProvider {
    conn: Connection,
}

impl SqliteDataProvider {
    /// Opens (or creates) a file-based database.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;
        let provider = SqliteDataProvider { conn };
        provider.ensure_schema()?;
        Ok(provider)
    }

    /// Opens an existing database without write access.
    ///
    /// # Errors
    /// Returns `MissingDataset` if no file exists at `db_path`.
    pub fn open_read_only<P: AsRef<Path>>(db_path: P) -> Result<Self, DataProviderError> {
        let db_path = db_path.as_ref();
        if !db_path.is_file() {
            return Err(DataProviderError::MissingDataset(db_path.display().to_string()));
        }
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(SqliteDataProvider { conn })
    }

    /// Creates a provider backed by an in-memory database. Useful for testing.
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let provider = SqliteDataProvider { conn };
        provider.ensure_schema()?;
        Ok(provider)
    }

    fn ensure_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS observations (
                kind TEXT NOT NULL,
                ts_code TEXT NOT NULL,
                trade_date INTEGER NOT NULL,
                value REAL,
                PRIMARY KEY (kind, ts_code, trade_date)
            );
            CREATE INDEX IF NOT EXISTS idx_observations_kind_date
                ON observations(kind, trade_date);
            CREATE TABLE IF NOT EXISTS instruments (
                ts_code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                list_date INTEGER,
                industry TEXT
            );
            CREATE TABLE IF NOT EXISTS company_data (
                partition INTEGER NOT NULL,
                ts_code TEXT NOT NULL,
                trade_date INTEGER NOT NULL,
                total_mv REAL,
                PRIMARY KEY (partition, ts_code, trade_date)
            );
            CREATE INDEX IF NOT EXISTS idx_company_data_partition
                ON company_data(partition);",
        )
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Inserts or replaces observations of one kind in a single transaction.
    pub fn insert_observations(
        &mut self,
        kind: ObservationKind,
        observations: &[Observation],
    ) -> SqliteResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO observations (kind, ts_code, trade_date, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for obs in observations {
                stmt.execute(params![
                    kind.as_str(),
                    obs.code.as_str(),
                    trade_date_to_int(obs.trade_date),
                    obs.value
                ])?;
            }
        }
        tx.commit()
    }

    /// Inserts or replaces a reference record.
    pub fn store_reference(&self, reference: &InstrumentReference) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO instruments (ts_code, name, list_date, industry)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reference.code.as_str(),
                reference.name,
                reference.list_date.map(trade_date_to_int),
                reference.industry
            ],
        )?;
        Ok(())
    }

    /// Inserts company data into `partition` (1 is the most recent).
    pub fn insert_company_data(
        &mut self,
        partition: i64,
        rows: &[CompanySnapshot],
    ) -> SqliteResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO company_data (partition, ts_code, trade_date, total_mv)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![
                    partition,
                    row.code.as_str(),
                    trade_date_to_int(row.trade_date),
                    row.total_mv
                ])?;
            }
        }
        tx.commit()
    }

    /// Copies every dataset of `source` into this database.
    ///
    /// The source's recent company-data partition becomes partition 1 and
    /// the remaining company rows partition 2. Returns the number of rows
    /// written.
    pub fn import_from<S>(&mut self, source: &S) -> Result<usize, DataProviderError>
    where
        S: DataProvider + ?Sized,
    {
        let volatility = source.volatility_observations()?;
        self.insert_observations(ObservationKind::Volatility, &volatility)?;
        let volume = source.volume_observations()?;
        self.insert_observations(ObservationKind::Volume, &volume)?;

        let reference = source.static_reference()?;
        for record in reference.values() {
            self.store_reference(record)?;
        }

        let recent = source.recent_company_data()?;
        let recent_keys: HashSet<(&InstrumentCode, chrono::NaiveDate)> =
            recent.iter().map(|row| (&row.code, row.trade_date)).collect();
        let older: Vec<CompanySnapshot> = source
            .all_company_data()?
            .into_iter()
            .filter(|row| !recent_keys.contains(&(&row.code, row.trade_date)))
            .collect();
        self.insert_company_data(RECENT_PARTITION, &recent)?;
        self.insert_company_data(RECENT_PARTITION + 1, &older)?;

        let written = volatility.len() + volume.len() + reference.len() + recent.len() + older.len();
        log::info!(
            "Imported {} rows ({} volatility, {} volume, {} instruments, {} company)",
            written,
            volatility.len(),
            volume.len(),
            reference.len(),
            recent.len() + older.len()
        );
        Ok(written)
    }

    fn load_observations(&self, kind: ObservationKind) -> Result<Vec<Observation>, DataProviderError> {
        let mut stmt = self.conn.prepare(
            "SELECT ts_code, trade_date, value FROM observations
             WHERE kind = ?1
             ORDER BY trade_date, ts_code",
        )?;
        let rows = stmt.query_map([kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut observations = Vec::new();
        for row in rows {
            let (code, date, value) = row?;
            observations.push(Observation::new(
                parse_code(code)?,
                parse_date(date)?,
                value.unwrap_or(f64::NAN),
            ));
        }
        log::debug!("Loaded {} {} observations", observations.len(), kind.as_str());
        Ok(observations)
    }

    fn load_company_data(&self, partition: Option<i64>) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        let sql = "SELECT ts_code, trade_date, total_mv FROM company_data
                   WHERE ?1 IS NULL OR partition = ?1
                   ORDER BY partition, trade_date, ts_code";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([partition], company_row)?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (code, date, total_mv) = row?;
            snapshots.push(CompanySnapshot::new(parse_code(code)?, parse_date(date)?, total_mv));
        }
        Ok(snapshots)
    }
}

fn company_row(row: &Row<'_>) -> SqliteResult<(String, i64, Option<f64>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn parse_code(raw: String) -> Result<InstrumentCode, DataProviderError> {
    InstrumentCode::new(raw).map_err(|e| DataProviderError::InvalidRecord(e.to_string()))
}

fn parse_date(raw: i64) -> Result<chrono::NaiveDate, DataProviderError> {
    trade_date_from_int(raw).map_err(|e| DataProviderError::InvalidRecord(e.to_string()))
}

impl DataProvider for SqliteDataProvider {
    fn volatility_observations(&self) -> Result<Vec<Observation>, DataProviderError> {
        self.load_observations(ObservationKind::Volatility)
    }

    fn volume_observations(&self) -> Result<Vec<Observation>, DataProviderError> {
        self.load_observations(ObservationKind::Volume)
    }

    fn static_reference(
        &self,
    ) -> Result<HashMap<InstrumentCode, InstrumentReference>, DataProviderError> {
        let mut stmt = self
            .conn
            .prepare("SELECT ts_code, name, list_date, industry FROM instruments")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut reference = HashMap::new();
        for row in rows {
            let (code, name, list_date, industry) = row?;
            let code = parse_code(code)?;
            let list_date = list_date.map(parse_date).transpose()?;
            reference.insert(
                code.clone(),
                InstrumentReference::new(code, name, list_date, industry),
            );
        }
        Ok(reference)
    }

    fn recent_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        self.load_company_data(Some(RECENT_PARTITION))
    }

    fn all_company_data(&self) -> Result<Vec<CompanySnapshot>, DataProviderError> {
        self.load_company_data(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::InMemoryDataProvider;
    use chrono::NaiveDate;

    fn code(raw: &str) -> InstrumentCode {
        InstrumentCode::new(raw).unwrap()
    }

    fn d(value: i64) -> NaiveDate {
        trade_date_from_int(value).unwrap()
    }

    fn table_exists(provider: &SqliteDataProvider, table_name: &str) -> bool {
        provider
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
            .unwrap()
            .exists([table_name])
            .unwrap()
    }

    #[test]
    fn test_automatic_schema_creation() {
        let provider = SqliteDataProvider::new_in_memory().unwrap();
        assert!(table_exists(&provider, "observations"));
        assert!(table_exists(&provider, "instruments"));
        assert!(table_exists(&provider, "company_data"));
        assert!(!table_exists(&provider, "nonexistent_table"));
    }

    #[test]
    fn test_schema_creation_idempotent() {
        let provider = SqliteDataProvider::new_in_memory().unwrap();
        provider.ensure_schema().unwrap();
        assert!(table_exists(&provider, "observations"));
    }

    #[test]
    fn test_observations_round_trip_by_kind() {
        let mut provider = SqliteDataProvider::new_in_memory().unwrap();
        provider
            .insert_observations(
                ObservationKind::Volatility,
                &[
                    Observation::new(code("000001.SZ"), d(20230104), 0.02),
                    Observation::new(code("000001.SZ"), d(20230103), 0.01),
                ],
            )
            .unwrap();
        provider
            .insert_observations(
                ObservationKind::Volume,
                &[Observation::new(code("000001.SZ"), d(20020104), 900.0)],
            )
            .unwrap();

        let volatility = provider.volatility_observations().unwrap();
        assert_eq!(volatility.len(), 2);
        assert_eq!(volatility[0].trade_date, d(20230103));
        assert_eq!(provider.volume_observations().unwrap().len(), 1);
    }

    #[test]
    fn test_reference_with_missing_optional_columns() {
        let provider = SqliteDataProvider::new_in_memory().unwrap();
        provider
            .store_reference(&InstrumentReference::new(
                code("000001.SZ"),
                "平安银行",
                Some(d(19910403)),
                Some("银行".to_string()),
            ))
            .unwrap();
        provider
            .store_reference(&InstrumentReference::new(code("000002.SZ"), "万科A", None, None))
            .unwrap();

        let reference = provider.static_reference().unwrap();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference[&code("000001.SZ")].list_date, Some(d(19910403)));
        assert_eq!(reference[&code("000002.SZ")].industry, None);
    }

    #[test]
    fn test_company_partitions() {
        let mut provider = SqliteDataProvider::new_in_memory().unwrap();
        provider
            .insert_company_data(1, &[CompanySnapshot::new(code("000001.SZ"), d(20240105), Some(1.0))])
            .unwrap();
        provider
            .insert_company_data(
                2,
                &[
                    CompanySnapshot::new(code("000001.SZ"), d(20231229), Some(2.0)),
                    CompanySnapshot::new(code("000002.SZ"), d(20231229), None),
                ],
            )
            .unwrap();

        assert_eq!(provider.recent_company_data().unwrap().len(), 1);
        let all = provider.all_company_data().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|row| row.total_mv.is_none()));
    }

    #[test]
    fn test_missing_value_reads_back_as_nan() {
        let mut provider = SqliteDataProvider::new_in_memory().unwrap();
        provider
            .insert_observations(
                ObservationKind::Volatility,
                &[Observation::new(code("000001.SZ"), d(20230103), f64::NAN)],
            )
            .unwrap();
        let rows = provider.volatility_observations().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].value.is_nan());
    }

    #[test]
    fn test_read_only_open_rejects_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.db");
        assert!(matches!(
            SqliteDataProvider::open_read_only(&path),
            Err(DataProviderError::MissingDataset(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_import_then_read_only_open() {
        let mut source = InMemoryDataProvider::new();
        source.add_observations(
            ObservationKind::Volatility,
            vec![Observation::new(code("000001.SZ"), d(20240105), 0.02)],
        );
        source.add_observations(
            ObservationKind::Volume,
            vec![Observation::new(code("000001.SZ"), d(20240105), 900.0)],
        );
        source.add_reference(InstrumentReference::new(code("000001.SZ"), "平安银行", None, None));
        let recent = vec![CompanySnapshot::new(code("000001.SZ"), d(20240105), Some(1.0))];
        source.add_company_partition(recent.clone());
        source.add_company_partition(vec![
            CompanySnapshot::new(code("000001.SZ"), d(20240105), Some(1.0)),
            CompanySnapshot::new(code("000001.SZ"), d(20231229), Some(2.0)),
        ]);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ratings.db");
        let written = SqliteDataProvider::new(&path).unwrap().import_from(&source).unwrap();
        assert_eq!(written, 5);

        let stored = SqliteDataProvider::open_read_only(&path).unwrap();
        assert_eq!(stored.recent_company_data().unwrap(), recent);
        assert_eq!(stored.all_company_data().unwrap().len(), 2);
        assert_eq!(stored.static_reference().unwrap()[&code("000001.SZ")].name, "平安银行");
        assert!(stored
            .store_reference(&InstrumentReference::new(code("000002.SZ"), "万科A", None, None))
            .is_err());
    }

    #[test]
    fn test_invalid_stored_date_is_reported() {
        let provider = SqliteDataProvider::new_in_memory().unwrap();
        provider
            .connection()
            .execute(
                "INSERT INTO observations (kind, ts_code, trade_date, value) VALUES ('volatility', '000001.SZ', 20231340, 0.1)",
                [],
            )
            .unwrap();
        assert!(matches!(
            provider.volatility_observations(),
            Err(DataProviderError::InvalidRecord(_))
        ));
    }
}
