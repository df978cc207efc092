//! Local sink connection and transaction traits

use crate::{QueryResult, Result, SinkFlavor, StatementResult, Value};

/// A connection to a local embedded store
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "duckdb")
    fn driver_name(&self) -> &str;

    /// Which store flavor this connection writes
    fn flavor(&self) -> SinkFlavor;

    /// Execute a DDL or DML statement
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Begin a transaction
    fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A transaction on a local store.
///
/// Dropping a transaction that was neither committed nor rolled back
/// rolls it back.
pub trait Transaction: Send {
    /// Commit the transaction
    fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    fn rollback(self: Box<Self>) -> Result<()>;

    /// Execute a statement within the transaction
    fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Prepare `sql` once and execute it for every parameter row.
    ///
    /// Returns the total number of affected rows.
    fn execute_many(&self, sql: &str, rows: &[Vec<Value>]) -> Result<u64>;
}
