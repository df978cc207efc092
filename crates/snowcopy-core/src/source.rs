//! Remote warehouse source contract

use crate::{ColumnDescriptor, Result, Value};

/// All rows of one remote table, with the column names the warehouse reported
#[derive(Debug, Clone, Default)]
pub struct FetchedRows {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl FetchedRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A warehouse that can describe and dump tables.
///
/// Authentication, retries and result paging belong to the implementation.
pub trait WarehouseSource: Send + Sync {
    /// Source identifier for logs (e.g. "snowflake")
    fn source_name(&self) -> &str;

    /// Columns of `table` in remote order
    fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Every row of `table`, positionally aligned with `describe_table`
    fn select_all(&self, table: &str) -> Result<FetchedRows>;
}
