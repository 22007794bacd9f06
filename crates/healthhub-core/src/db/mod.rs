//! SQLite storage for patients and diagnostic results.

mod diagnostic_results;
mod patients;
mod schema;

pub use schema::*;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Largest number of bound parameters used in one `IN (...)` list.
const MAX_BATCH_PARAMS: usize = 500;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening database");
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Register SQL functions and apply the schema.
    fn initialize(&self) -> DbResult<()> {
        // SQLite's lower() only folds ASCII
        self.conn.create_scalar_function(
            "unicode_lower",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|s| s.to_lowercase()))
            },
        )?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction on the shared connection. Rolls back on drop unless
    /// committed. Transactions must not be nested.
    pub fn transaction(&self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }
}

// ============================================================================
// Column encodings
// ============================================================================

/// Fixed-width RFC 3339 with microseconds, so text order is chronological.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData(format!("timestamp '{}': {}", value, e)))
}

pub(crate) fn encode_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(value: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| DbError::InvalidData(format!("date '{}': {}", value, e)))
}

pub(crate) fn decode_uuid(value: &str) -> DbResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| DbError::InvalidData(format!("id '{}': {}", value, e)))
}

/// `?, ?, ?` for an `IN` list of the given length.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Deduplicated, hyphenated id strings split into bind-sized chunks.
pub(crate) fn id_chunks(ids: &[Uuid]) -> Vec<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<String> = ids
        .iter()
        .filter(|id| seen.insert(**id))
        .map(Uuid::to_string)
        .collect();
    unique
        .chunks(MAX_BATCH_PARAMS)
        .map(<[String]>::to_vec)
        .collect()
}

/// Normalize a search needle: case-folded, empty means no constraint.
pub(crate) fn needle(term: Option<&str>) -> Option<String> {
    term.map(str::to_lowercase).filter(|t| !t.is_empty())
}

/// SQLite takes `LIMIT -1` as unbounded.
pub(crate) fn limit_offset(request: crate::models::PageRequest) -> (i64, i64) {
    let limit = request
        .take
        .map(|t| i64::try_from(t).unwrap_or(i64::MAX))
        .unwrap_or(-1);
    let offset = i64::try_from(request.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}
