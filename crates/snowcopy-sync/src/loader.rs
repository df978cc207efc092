//! Local table creation and bulk loading

use std::sync::Arc;

use snowcopy_core::{Connection, LocalColumnSpec, SinkFlavor, SnowcopyError, Value};

use crate::identifier::{quote_identifier, quote_identifier_list};
use crate::LoadError;

/// `CREATE TABLE IF NOT EXISTS` for the mapped schema in the sink's vocabulary
pub fn create_table_sql(table: &str, schema: &[LocalColumnSpec], flavor: SinkFlavor) -> String {
    let columns = schema
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.local_type.declaration(flavor)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_identifier(table), columns)
}

/// Column-named insert with one positional placeholder per column
pub fn insert_sql(table: &str, schema: &[LocalColumnSpec]) -> String {
    let placeholders = vec!["?"; schema.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        quote_identifier_list(schema.iter().map(|c| c.name.as_str())),
        placeholders
    )
}

/// Writes converted rows into one local store
pub struct TableLoader {
    connection: Arc<dyn Connection>,
}

impl TableLoader {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }

    pub fn flavor(&self) -> SinkFlavor {
        self.connection.flavor()
    }

    /// Create the table if it does not exist yet
    pub fn create_table(&self, table: &str, schema: &[LocalColumnSpec]) -> Result<(), SnowcopyError> {
        if schema.is_empty() {
            return Err(SnowcopyError::Schema(format!(
                "table '{}' has no columns",
                table
            )));
        }
        let sql = create_table_sql(table, schema, self.flavor());
        tracing::debug!(table = %table, sql = %sql, "Creating local table");
        self.connection.execute(&sql, &[])?;
        Ok(())
    }

    /// Check every row, then insert them all in a single transaction.
    ///
    /// Nothing is written when a row has the wrong width, a value does not
    /// fit its column's local type, or the store rejects an insert.
    pub fn load_rows(
        &self,
        table: &str,
        schema: &[LocalColumnSpec],
        rows: &[Vec<Value>],
    ) -> Result<u64, LoadError> {
        validate_rows(table, schema, rows)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let store_error = |source: SnowcopyError| LoadError::Store {
            table: table.to_string(),
            source,
        };

        let sql = insert_sql(table, schema);
        let tx = self.connection.begin_transaction().map_err(store_error)?;
        match tx.execute_many(&sql, rows) {
            Ok(inserted) => {
                tx.commit().map_err(store_error)?;
                tracing::info!(table = %table, rows = inserted, "Loaded rows");
                Ok(inserted)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback() {
                    tracing::error!(table = %table, error = %rollback_error, "Rollback failed");
                }
                Err(store_error(error))
            }
        }
    }
}

fn validate_rows(table: &str, schema: &[LocalColumnSpec], rows: &[Vec<Value>]) -> Result<(), LoadError> {
    for (row_index, row) in rows.iter().enumerate() {
        if row.len() != schema.len() {
            return Err(LoadError::ArityMismatch {
                table: table.to_string(),
                location: format!("row {}", row_index),
                expected: schema.len(),
                actual: row.len(),
            });
        }
        for (value, column) in row.iter().zip(schema) {
            if !column.local_type.accepts(value) {
                return Err(LoadError::TypeMismatch {
                    table: table.to_string(),
                    row: row_index,
                    column: column.name.clone(),
                    kind: value.kind(),
                    local_type: column.local_type,
                });
            }
        }
    }
    Ok(())
}
