//! Relational storage collaborator.
//!
//! SQLite through rusqlite, one connection per call on a blocking thread,
//! every call bounded by the storage timeout. Query execution uses a
//! read-only connection.

use crate::config::StorageConfig;
use anyhow::Context;
use async_trait::async_trait;
use gridops_shared::{GridError, ResultTable};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Schema shown to the backend when generating statements
pub const SCHEMA_DESCRIPTION: &str = "users (username TEXT, meter_id INTEGER), meter_loads (meter_id INTEGER, date_time TEXT, forecasted_load REAL)";

const CREATE_USERS: &str =
    "CREATE TABLE IF NOT EXISTS users (username TEXT PRIMARY KEY, meter_id INTEGER)";
const CREATE_METER_LOADS: &str =
    "CREATE TABLE IF NOT EXISTS meter_loads (meter_id INTEGER, date_time TEXT, forecasted_load REAL)";

const FEATURE_SQL: &str =
    "SELECT SUM(forecasted_load) FROM meter_loads WHERE date_time LIKE ?1";

/// Create both tables if they are missing.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(CREATE_USERS, [])?;
    conn.execute(CREATE_METER_LOADS, [])?;
    Ok(())
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Run a statement and collect its rows. Failures are `Execution`.
    async fn execute(&self, statement: &str) -> Result<ResultTable, GridError>;

    /// Summed stored load for all rows whose timestamp starts with `date_key`.
    async fn lookup_feature(&self, date_key: &str) -> Result<Option<f64>, GridError>;
}

// ============================================================================
// SQLite
// ============================================================================

enum CallFailure {
    TimedOut(Duration),
    Sql(rusqlite::Error),
    Worker(String),
}

impl CallFailure {
    fn message(&self) -> String {
        match self {
            CallFailure::TimedOut(d) => format!("timed out after {}s", d.as_secs_f32()),
            CallFailure::Sql(e) => e.to_string(),
            CallFailure::Worker(e) => format!("storage worker failed: {}", e),
        }
    }
}

pub struct SqliteStorage {
    path: PathBuf,
    timeout: Duration,
}

impl SqliteStorage {
    pub fn new(path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.db_path, config.timeout())
    }

    /// Create the database file and tables if missing
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn = Connection::open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        ensure_schema(&conn).context("creating schema")?;
        info!("Storage ready at {}", self.path.display());
        Ok(())
    }

    /// Run `f` against a fresh read-only connection, off the async runtime.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, CallFailure>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let task = tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            f(&conn)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(CallFailure::TimedOut(self.timeout)),
            Ok(Err(join)) => Err(CallFailure::Worker(join.to_string())),
            Ok(Ok(Err(e))) => Err(CallFailure::Sql(e)),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn execute(&self, statement: &str) -> Result<ResultTable, GridError> {
        let (first, has_more) = split_first_statement(statement);
        if has_more {
            return Err(GridError::Execution(format!(
                "only one statement may run, found more after: {}",
                first
            )));
        }
        let sql = first.to_string();
        if sql.is_empty() {
            return Err(GridError::Execution("empty statement".to_string()));
        }
        debug!("Executing: {}", sql);
        let table = self
            .with_connection(move |conn| query_table(conn, &sql))
            .await
            .map_err(|f| GridError::Execution(f.message()))?;
        debug!("Statement returned {} rows", table.row_count());
        Ok(table)
    }

    async fn lookup_feature(&self, date_key: &str) -> Result<Option<f64>, GridError> {
        let pattern = format!("{}%", date_key);
        self.with_connection(move |conn| {
            conn.query_row(FEATURE_SQL, params![pattern], |row| row.get::<_, Option<f64>>(0))
        })
        .await
        .map_err(|f| GridError::Storage(f.message()))
    }
}

/// First statement of `sql`, trimmed, and whether anything runnable follows it.
///
/// Splits at the first `;` outside quotes and comments. Whitespace, comments
/// and further `;` after it do not count as another statement.
fn split_first_statement(sql: &str) -> (&str, bool) {
    let bytes = sql.as_bytes();
    let mut end = None;
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        match byte {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 1;
            }
            b';' if end.is_none() => end = Some(i),
            b';' => {}
            _ if byte.is_ascii_whitespace() => {}
            _ => {
                if let Some(end) = end {
                    return (sql[..end].trim(), true);
                }
                if matches!(byte, b'\'' | b'"' | b'`' | b'[') {
                    let close = if byte == b'[' { b']' } else { byte };
                    i += 1;
                    while i < bytes.len() && bytes[i] != close {
                        i += 1;
                    }
                }
            }
        }
        i += 1;
    }
    (sql[..end.unwrap_or(sql.len())].trim(), false)
}

fn query_table(conn: &Connection, sql: &str) -> rusqlite::Result<ResultTable> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();
    let mut table = ResultTable::new(columns);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(json_value(row.get_ref(idx)?));
        }
        table.push_row(values);
    }
    Ok(table)
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}

// ============================================================================
// Fake storage (testing)
// ============================================================================

/// In-memory storage with scripted results and recorded calls.
#[derive(Default)]
pub struct FakeStorage {
    result: Option<ResultTable>,
    execute_error: Option<String>,
    features: HashMap<String, f64>,
    executed: Arc<Mutex<Vec<String>>>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement returns `table`
    pub fn with_result(mut self, table: ResultTable) -> Self {
        self.result = Some(table);
        self
    }

    /// Every statement fails with `message`
    pub fn failing_with(mut self, message: &str) -> Self {
        self.execute_error = Some(message.to_string());
        self
    }

    pub fn with_feature(mut self, date_key: &str, value: f64) -> Self {
        self.features.insert(date_key.to_string(), value);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn execute(&self, statement: &str) -> Result<ResultTable, GridError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(statement.to_string());
        }
        match &self.execute_error {
            Some(message) => Err(GridError::Execution(message.clone())),
            None => Ok(self.result.clone().unwrap_or_default()),
        }
    }

    async fn lookup_feature(&self, date_key: &str) -> Result<Option<f64>, GridError> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(date_key.to_string());
        }
        Ok(self.features.get(date_key).copied())
    }
}
