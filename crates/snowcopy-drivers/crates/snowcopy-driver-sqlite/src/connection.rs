//! SQLite connection and transaction

use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use snowcopy_core::{
    ColumnMeta, Connection, LocalType, QueryResult, Result, Row, SinkFlavor, SnowcopyError,
    StatementResult, Transaction, Value, temporal,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One open SQLite database file
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    path: String,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open a local database file, creating it when missing. `:memory:` opens
    /// a private in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let resolved = resolve_path(path)?;
        let conn = if resolved == MEMORY_PATH {
            RusqliteConnection::open_in_memory()
        } else {
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(&resolved, flags)
        }
        .map_err(|e| SnowcopyError::Connection(format!("cannot open SQLite sink '{}': {}", resolved, e)))?;

        for (pragma, value) in [("journal_mode", "WAL"), ("synchronous", "NORMAL")] {
            conn.pragma_update(None, pragma, value).map_err(|e| {
                SnowcopyError::Connection(format!("cannot set {} on '{}': {}", pragma, resolved, e))
            })?;
        }

        tracing::info!(path = %resolved, "Opened SQLite sink");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: resolved,
            closed: AtomicBool::new(false),
        })
    }

    /// Resolved database path
    pub fn path(&self) -> &str {
        &self.path
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SnowcopyError::Driver("Connection is closed".to_string()));
        }
        Ok(())
    }
}

const MEMORY_PATH: &str = ":memory:";

/// Expands a leading `~/` and checks that the parent directory exists;
/// `:memory:` and `file:` URIs pass through untouched.
fn resolve_path(path: &str) -> Result<String> {
    if path == MEMORY_PATH || path.starts_with("file:") {
        return Ok(path.to_string());
    }
    let resolved = match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME")
            .map(|home| Path::new(&home).join(rest))
            .ok_or_else(|| SnowcopyError::Configuration("HOME is not set, cannot expand '~'".into()))?,
        None => Path::new(path).to_path_buf(),
    };
    if let Some(parent) = resolved.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(SnowcopyError::Connection(format!(
            "directory for SQLite sink does not exist: {}",
            parent.display()
        )));
    }
    Ok(resolved.to_string_lossy().into_owned())
}

impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn flavor(&self) -> SinkFlavor {
        SinkFlavor::Sqlite
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_not_closed()?;
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_not_closed()?;
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_not_closed()?;
        tracing::debug!("beginning SQLite transaction");
        {
            let conn = self.conn.lock();
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(|e| SnowcopyError::Query(format!("Failed to begin transaction: {}", e)))?;
        }
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            committed: false,
            rolled_back: false,
        }))
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(path = %self.path, "closing SQLite connection");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// An open `BEGIN` on a SQLite sink.
///
/// Issues raw `BEGIN` / `COMMIT` / `ROLLBACK` SQL so that it can share the
/// connection `Arc<Mutex<…>>` without rusqlite's borrow-based transaction
/// lifetime.
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    committed: bool,
    rolled_back: bool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!("SQLite transaction dropped without commit or rollback, issuing automatic rollback");
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

impl Transaction for SqliteTransaction {
    fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");

        if self.rolled_back {
            return Err(SnowcopyError::Query("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(SnowcopyError::Query("Transaction already committed".into()));
        }

        let conn = self.conn.lock();
        conn.execute_batch("COMMIT")
            .map_err(|e| SnowcopyError::Query(format!("Failed to commit transaction: {}", e)))?;
        drop(conn);

        self.committed = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");

        if self.committed {
            return Err(SnowcopyError::Query("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        let conn = self.conn.lock();
        conn.execute_batch("ROLLBACK")
            .map_err(|e| SnowcopyError::Query(format!("Failed to rollback transaction: {}", e)))?;
        drop(conn);

        self.rolled_back = true;
        Ok(())
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }

    fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        tracing::debug!(
            sql_preview = %sql.chars().take(100).collect::<String>(),
            rows = rows.len(),
            "executing prepared statement in SQLite transaction"
        );
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SnowcopyError::Query(format!("Failed to prepare statement: {}", e)))?;

        let mut affected = 0u64;
        for (idx, row) in rows.iter().enumerate() {
            let rusqlite_params = values_to_rusqlite(row);
            affected += stmt
                .execute(params_from_iter(rusqlite_params.iter()))
                .map_err(|e| {
                    SnowcopyError::Query(format!("Failed to execute row {}: {}", idx, e))
                })? as u64;
        }
        Ok(affected)
    }
}

fn run_execute(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let rusqlite_params = values_to_rusqlite(params);
    let rows_affected = conn
        .execute(sql, params_from_iter(rusqlite_params.iter()))
        .map_err(|e| SnowcopyError::Query(format!("Failed to execute statement: {}", e)))?;

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(StatementResult {
        affected_rows: rows_affected as u64,
    })
}

fn run_query(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let rusqlite_params = values_to_rusqlite(params);

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SnowcopyError::Query(format!("Failed to prepare query: {}", e)))?;

    let column_count = stmt.column_count();
    let mut column_names: Vec<String> = Vec::with_capacity(column_count);
    let mut columns: Vec<ColumnMeta> = Vec::with_capacity(column_count);
    let mut declared: Vec<Option<LocalType>> = Vec::with_capacity(column_count);

    // decl_type is the type written in CREATE TABLE; expressions have none
    for (idx, col) in stmt.columns().iter().enumerate() {
        let name = col.name().to_string();
        let data_type = col.decl_type().unwrap_or("DYNAMIC").to_string();
        declared.push(LocalType::from_declaration(&data_type));
        column_names.push(name.clone());
        columns.push(ColumnMeta {
            name,
            data_type,
            ordinal: idx,
        });
    }

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(rusqlite_params.iter()))
        .map_err(|e| SnowcopyError::Query(format!("Failed to execute query: {}", e)))?;

    while let Some(row) = query_rows
        .next()
        .map_err(|e| SnowcopyError::Query(format!("Failed to fetch row: {}", e)))?
    {
        let mut values = Vec::with_capacity(column_count);
        for (i, local_type) in declared.iter().enumerate() {
            values.push(rusqlite_to_value(row, i, *local_type)?);
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms = execution_time_ms,
        "query executed successfully"
    );
    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms,
    })
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

/// Write side of the adapter: temporal values become ISO-8601 text and
/// booleans become 0/1.
fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::Decimal(d) => rusqlite::types::Value::Text(d.clone()),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Date(d) => rusqlite::types::Value::Text(temporal::format_date(d)),
        Value::Time(t) => rusqlite::types::Value::Text(temporal::format_time(t)),
        Value::DateTime(dt) => rusqlite::types::Value::Text(temporal::format_datetime(dt)),
        Value::DateTimeUtc(dt) => {
            rusqlite::types::Value::Text(temporal::format_datetime(&dt.naive_utc()))
        }
    }
}

/// Read side of the adapter, driven by the column's declared type.
///
/// Text that does not parse as the declared temporal type is returned as a
/// string rather than dropped.
fn rusqlite_to_value(
    row: &rusqlite::Row,
    idx: usize,
    declared: Option<LocalType>,
) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| SnowcopyError::Query(e.to_string()))?;

    let value = match (value_ref, declared) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), Some(LocalType::Boolean)) if i == 0 || i == 1 => Value::Bool(i == 1),
        (ValueRef::Integer(i), Some(LocalType::Real)) => Value::Float64(i as f64),
        (ValueRef::Integer(i), _) => Value::Int64(i),
        (ValueRef::Real(f), _) => Value::Float64(f),
        (ValueRef::Text(s), declared) => {
            let text = String::from_utf8_lossy(s).to_string();
            match declared {
                Some(LocalType::Date) => temporal::parse_date(&text)
                    .map(Value::Date)
                    .unwrap_or(Value::String(text)),
                Some(LocalType::DateTime) => temporal::parse_datetime(&text)
                    .map(Value::DateTime)
                    .unwrap_or(Value::String(text)),
                _ => Value::String(text),
            }
        }
        (ValueRef::Blob(b), _) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
    };

    Ok(value)
}
