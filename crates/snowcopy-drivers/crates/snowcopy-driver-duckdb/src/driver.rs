//! DuckDB driver implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use duckdb::params_from_iter;
use duckdb::types::{TimeUnit, ValueRef};
use snowcopy_core::{
    ColumnMeta, Connection, QueryResult, Result, Row, SinkDriver, SinkFlavor, SnowcopyError,
    StatementResult, Transaction, Value, temporal,
};
use uuid::Uuid;

/// `NaiveDate::num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// DuckDB sink driver
///
/// DuckDB can run in-memory (`:memory:`) or persist data to a file.
pub struct DuckDbDriver;

impl DuckDbDriver {
    /// Create a new DuckDB driver instance
    pub fn new() -> Self {
        Self
    }
}

impl Default for DuckDbDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkDriver for DuckDbDriver {
    fn id(&self) -> &'static str {
        "duckdb"
    }

    fn flavor(&self) -> SinkFlavor {
        SinkFlavor::DuckDb
    }

    #[tracing::instrument(skip(self))]
    fn connect(&self, path: &str) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(DuckDbConnection::open(path)?))
    }
}

/// DuckDB connection wrapper implementing the Connection trait
pub struct DuckDbConnection {
    connection: Arc<Mutex<duckdb::Connection>>,
    path: String,
    closed: AtomicBool,
}

impl DuckDbConnection {
    /// Open a database file, or an in-memory database for `:memory:`
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening DuckDB database");
        let connection = if path == ":memory:" {
            duckdb::Connection::open_in_memory()
        } else {
            duckdb::Connection::open(path)
        }
        .map_err(|e| SnowcopyError::Connection(format!("Failed to open DuckDB database: {}", e)))?;

        Ok(Self::new(connection, path.to_string()))
    }

    /// Create a new DuckDB connection wrapper
    pub fn new(connection: duckdb::Connection, path: String) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
            path,
            closed: AtomicBool::new(false),
        }
    }

    /// Get the database path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if this is an in-memory database
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SnowcopyError::Driver("Connection is closed".to_string()));
        }
        Ok(())
    }
}

fn lock(connection: &Mutex<duckdb::Connection>) -> Result<MutexGuard<'_, duckdb::Connection>> {
    connection
        .lock()
        .map_err(|e| SnowcopyError::Driver(format!("Lock poisoned: {}", e)))
}

impl Connection for DuckDbConnection {
    fn driver_name(&self) -> &str {
        "duckdb"
    }

    fn flavor(&self) -> SinkFlavor {
        SinkFlavor::DuckDb
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_not_closed()?;
        let conn = lock(&self.connection)?;
        run_execute(&conn, sql, params)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_not_closed()?;
        let conn = lock(&self.connection)?;
        run_query(&conn, sql, params)
    }

    fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_not_closed()?;
        tracing::debug!("beginning DuckDB transaction");
        lock(&self.connection)?
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| SnowcopyError::Query(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(DuckDbTransaction {
            connection: Arc::clone(&self.connection),
            finished: false,
        }))
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(path = %self.path, "DuckDB connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for DuckDbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbConnection")
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// DuckDB transaction over the shared connection, rolled back on drop
pub struct DuckDbTransaction {
    connection: Arc<Mutex<duckdb::Connection>>,
    finished: bool,
}

impl DuckDbTransaction {
    fn finish(&mut self, statement: &str) -> Result<()> {
        if self.finished {
            return Err(SnowcopyError::Query("Transaction already finished".into()));
        }
        self.finished = true;
        lock(&self.connection)?
            .execute_batch(statement)
            .map_err(|e| SnowcopyError::Query(format!("Failed to {}: {}", statement, e)))
    }
}

impl Drop for DuckDbTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("DuckDB transaction dropped without commit or rollback, issuing automatic rollback");
            match self.connection.lock() {
                Ok(conn) => {
                    if let Err(e) = conn.execute_batch("ROLLBACK") {
                        tracing::error!(error = %e, "automatic rollback on drop failed");
                    }
                }
                Err(e) => tracing::error!(error = %e, "automatic rollback skipped"),
            }
        }
    }
}

impl Transaction for DuckDbTransaction {
    fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing DuckDB transaction");
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back DuckDB transaction");
        self.finish("ROLLBACK")
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let conn = lock(&self.connection)?;
        run_execute(&conn, sql, params)
    }

    fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        tracing::debug!(
            sql_preview = %sql.chars().take(100).collect::<String>(),
            rows = rows.len(),
            "executing prepared statement in DuckDB transaction"
        );
        let conn = lock(&self.connection)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SnowcopyError::Driver(format!("Prepare failed: {}", e)))?;

        let mut affected = 0u64;
        for (idx, row) in rows.iter().enumerate() {
            let duck_params = values_to_duckdb(row);
            affected += stmt
                .execute(params_from_iter(duck_params.iter()))
                .map_err(|e| SnowcopyError::Driver(format!("Execute failed at row {}: {}", idx, e)))?
                as u64;
        }
        Ok(affected)
    }
}

fn run_execute(conn: &duckdb::Connection, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let start = std::time::Instant::now();
    let duck_params = values_to_duckdb(params);
    let affected = conn
        .execute(sql, params_from_iter(duck_params.iter()))
        .map_err(|e| SnowcopyError::Driver(format!("Execute failed: {}", e)))?;

    tracing::debug!(
        affected_rows = affected,
        duration_ms = start.elapsed().as_millis() as u64,
        "execute completed"
    );
    Ok(StatementResult {
        affected_rows: affected as u64,
    })
}

fn run_query(conn: &duckdb::Connection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let start = std::time::Instant::now();
    let duck_params = values_to_duckdb(params);

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SnowcopyError::Driver(format!("Prepare failed: {}", e)))?;

    let mut duckdb_rows = stmt
        .query(params_from_iter(duck_params.iter()))
        .map_err(|e| SnowcopyError::Driver(format!("Query failed: {}", e)))?;

    // Column names are only known once the statement has run
    let column_names: Vec<String> = duckdb_rows
        .as_ref()
        .map(|r| r.column_names().iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();
    let column_count = column_names.len();

    let mut raw_rows: Vec<Vec<Value>> = Vec::new();
    while let Some(row) = duckdb_rows
        .next()
        .map_err(|e| SnowcopyError::Driver(format!("Row fetch failed: {}", e)))?
    {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value_ref = row
                .get_ref(i)
                .map_err(|e| SnowcopyError::Driver(format!("Column read failed: {}", e)))?;
            values.push(value_ref_to_value(value_ref));
        }
        raw_rows.push(values);
    }

    let columns: Vec<ColumnMeta> = column_names
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnMeta {
            name: name.clone(),
            data_type: raw_rows
                .iter()
                .filter_map(|values| values.get(idx))
                .find(|v| !v.is_null())
                .map(duckdb_type_name)
                .unwrap_or("NULL")
                .to_string(),
            ordinal: idx,
        })
        .collect();

    let rows: Vec<Row> = raw_rows
        .into_iter()
        .map(|values| Row::new(column_names.clone(), values))
        .collect();

    let execution_time_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        duration_ms = execution_time_ms,
        "query completed"
    );

    Ok(QueryResult {
        id: Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms,
    })
}

fn values_to_duckdb(values: &[Value]) -> Vec<duckdb::types::Value> {
    values.iter().map(value_to_duckdb).collect()
}

/// Temporal values are bound as ISO-8601 text and cast by DuckDB to the
/// target column's DATE or TIMESTAMP type.
fn value_to_duckdb(value: &Value) -> duckdb::types::Value {
    use duckdb::types::Value as DuckValue;

    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Int64(i) => DuckValue::BigInt(*i),
        Value::Float64(f) => DuckValue::Double(*f),
        Value::Decimal(d) => DuckValue::Text(d.clone()),
        Value::String(s) => DuckValue::Text(s.clone()),
        Value::Bytes(b) => DuckValue::Blob(b.clone()),
        Value::Date(d) => DuckValue::Text(temporal::format_date(d)),
        Value::Time(t) => DuckValue::Text(temporal::format_time(t)),
        Value::DateTime(dt) => DuckValue::Text(temporal::format_datetime(dt)),
        Value::DateTimeUtc(dt) => DuckValue::Text(temporal::format_datetime(&dt.naive_utc())),
    }
}

fn value_ref_to_value(value_ref: ValueRef<'_>) -> Value {
    match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int64(i as i64),
        ValueRef::SmallInt(i) => Value::Int64(i as i64),
        ValueRef::Int(i) => Value::Int64(i as i64),
        ValueRef::BigInt(i) => Value::Int64(i),
        ValueRef::HugeInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Decimal(i.to_string()),
        },
        ValueRef::UTinyInt(i) => Value::Int64(i as i64),
        ValueRef::USmallInt(i) => Value::Int64(i as i64),
        ValueRef::UInt(i) => Value::Int64(i as i64),
        ValueRef::UBigInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::Decimal(i.to_string()),
        },
        ValueRef::Float(f) => Value::Float64(f as f64),
        ValueRef::Double(f) => Value::Float64(f),
        ValueRef::Decimal(d) => Value::Decimal(d.to_string()),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        ValueRef::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(Value::Date)
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(unit, raw) => chrono::DateTime::from_timestamp_micros(to_micros(unit, raw))
            .map(|dt| Value::DateTime(dt.naive_utc()))
            .unwrap_or(Value::Null),
        ValueRef::Time64(unit, raw) => {
            let micros = to_micros(unit, raw);
            let secs = micros.div_euclid(1_000_000) as u32;
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                .map(Value::Time)
                .unwrap_or(Value::Null)
        }
        _ => {
            tracing::debug!("unsupported DuckDB value type, reading as NULL");
            Value::Null
        }
    }
}

fn to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw.div_euclid(1_000),
    }
}

fn duckdb_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Int64(_) => "BIGINT",
        Value::Float64(_) => "DOUBLE",
        Value::Decimal(_) => "DECIMAL",
        Value::String(_) => "VARCHAR",
        Value::Bytes(_) => "BLOB",
        Value::Date(_) => "DATE",
        Value::Time(_) => "TIME",
        Value::DateTime(_) | Value::DateTimeUtc(_) => "TIMESTAMP",
    }
}
