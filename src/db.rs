//! PostgreSQL persistence for normalized readings.
//!
//! The table is append-only: the pipeline inserts one batch per run and
//! never updates or deletes. Every operation opens its own connection and
//! drops it before returning, including on error, so no handle outlives the
//! call that needed it.
//!
//! Column names keep the provider's camelCase spelling (quoted) because the
//! dashboard queries them by those names.

use crate::logging::{self, Component};
use crate::model::{NormalizedReading, PersistError};
use postgres::{Client, GenericClient, NoTls};

pub const DEFAULT_TABLE: &str = "air_quality_processed";

/// Accepts a batch of normalized readings for durable storage.
pub trait ReadingSink {
    /// Appends every row as one unit. Returns the number of rows written.
    fn append(&mut self, rows: &[NormalizedReading]) -> Result<usize, PersistError>;
}

/// Reads persisted rows back for the dashboard.
pub trait ReadingSource {
    /// Most recent `dataTime` present in storage, if any.
    fn latest_data_time(&mut self) -> Result<Option<String>, PersistError>;
    /// All rows stored for one `dataTime`.
    fn rows_at(&mut self, data_time: &str) -> Result<Vec<NormalizedReading>, PersistError>;
}

#[derive(Debug, Clone)]
pub struct PgReadingStore {
    url: String,
    table: String,
    idempotent: bool,
}

impl PgReadingStore {
    /// `idempotent` turns the append into an insert that skips rows whose
    /// `(dataTime, stationName)` pair is already stored. Off by default:
    /// re-running a snapshot then appends duplicates.
    pub fn new(url: impl Into<String>, table: impl Into<String>, idempotent: bool) -> Result<Self, PersistError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { url: url.into(), table, idempotent })
    }

    fn connect(&self) -> Result<Client, PersistError> {
        Client::connect(&self.url, NoTls).map_err(PersistError::db("connect"))
    }

    /// Creates the table (and the uniqueness index when idempotent).
    pub fn ensure_schema(&self) -> Result<(), PersistError> {
        let mut client = self.connect()?;
        self.create_schema(&mut client)?;
        logging::info(Component::Database, None, &format!("schema ready: {}", self.table));
        Ok(())
    }

    fn create_schema<C: GenericClient>(&self, client: &mut C) -> Result<(), PersistError> {
        client
            .batch_execute(&create_table_sql(&self.table))
            .map_err(PersistError::db("create table"))?;
        if self.idempotent {
            client
                .batch_execute(&unique_index_sql(&self.table))
                .map_err(PersistError::db("create unique index"))?;
        }
        Ok(())
    }

    /// Number of rows stored for one `dataTime`.
    pub fn count_at(&self, data_time: &str) -> Result<i64, PersistError> {
        let mut client = self.connect()?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE \"dataTime\" = $1", self.table);
        let row = client.query_one(&sql, &[&data_time]).map_err(PersistError::db("count"))?;
        Ok(row.get(0))
    }

    /// Removes every row for one `dataTime`. Used by tests for cleanup only.
    pub fn delete_at(&self, data_time: &str) -> Result<u64, PersistError> {
        let mut client = self.connect()?;
        let sql = format!("DELETE FROM {} WHERE \"dataTime\" = $1", self.table);
        client.execute(&sql, &[&data_time]).map_err(PersistError::db("delete"))
    }
}

impl ReadingSink for PgReadingStore {
    fn append(&mut self, rows: &[NormalizedReading]) -> Result<usize, PersistError> {
        let mut client = self.connect()?;
        let mut tx = client.transaction().map_err(PersistError::db("begin"))?;
        // First append into a fresh database creates the table.
        self.create_schema(&mut tx)?;
        let statement = tx
            .prepare(&insert_sql(&self.table, self.idempotent))
            .map_err(PersistError::db("prepare insert"))?;

        let mut written = 0usize;
        for row in rows {
            written += tx
                .execute(
                    &statement,
                    &[
                        &row.data_time,
                        &row.station_name,
                        &row.pm10_value,
                        &row.pm25_value,
                        &row.o3_value,
                    ],
                )
                .map_err(PersistError::db("insert"))? as usize;
        }

        tx.commit().map_err(PersistError::db("commit"))?;
        if written < rows.len() {
            logging::debug(
                Component::Database,
                None,
                &format!("{} rows already stored, skipped", rows.len() - written),
            );
        }
        Ok(written)
    }
}

impl ReadingSource for PgReadingStore {
    fn latest_data_time(&mut self) -> Result<Option<String>, PersistError> {
        let mut client = self.connect()?;
        let sql = format!("SELECT MAX(\"dataTime\") FROM {}", self.table);
        let row = client.query_one(&sql, &[]).map_err(PersistError::db("latest dataTime"))?;
        Ok(row.get(0))
    }

    fn rows_at(&mut self, data_time: &str) -> Result<Vec<NormalizedReading>, PersistError> {
        let mut client = self.connect()?;
        let sql = format!(
            "SELECT \"dataTime\", \"stationName\", \"pm10Value\", \"pm25Value\", \"o3Value\"
             FROM {} WHERE \"dataTime\" = $1",
            self.table
        );
        let rows = client.query(&sql, &[&data_time]).map_err(PersistError::db("select slice"))?;
        Ok(rows
            .iter()
            .map(|row| NormalizedReading {
                data_time: row.get(0),
                station_name: row.get(1),
                pm10_value: row.get(2),
                pm25_value: row.get(3),
                o3_value: row.get(4),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

/// Table names are interpolated into SQL, so only plain identifiers
/// (optionally schema-qualified) are accepted.
fn validate_table_name(table: &str) -> Result<(), PersistError> {
    let valid_part = |part: &str| {
        !part.is_empty()
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !part.starts_with(|c: char| c.is_ascii_digit())
    };
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(PersistError::InvalidTable(table.to_string()));
    }
    Ok(())
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            \"dataTime\"    TEXT,
            \"stationName\" TEXT,
            \"pm10Value\"   DOUBLE PRECISION,
            \"pm25Value\"   DOUBLE PRECISION,
            \"o3Value\"     DOUBLE PRECISION
        )",
        table
    )
}

fn unique_index_sql(table: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {}_time_station_idx ON {} (\"dataTime\", \"stationName\")",
        table.replace('.', "_"),
        table
    )
}

fn insert_sql(table: &str, idempotent: bool) -> String {
    let mut sql = format!(
        "INSERT INTO {} (\"dataTime\", \"stationName\", \"pm10Value\", \"pm25Value\", \"o3Value\")
         VALUES ($1, $2, $3, $4, $5)",
        table
    );
    if idempotent {
        sql.push_str(" ON CONFLICT (\"dataTime\", \"stationName\") DO NOTHING");
    }
    sql
}
