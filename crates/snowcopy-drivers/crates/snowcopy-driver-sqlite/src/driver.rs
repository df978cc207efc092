//! SQLite driver implementation

use std::sync::Arc;

use snowcopy_core::{Connection, Result, SinkDriver, SinkFlavor};

use crate::SqliteConnection;

/// SQLite sink driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkDriver for SqliteDriver {
    fn id(&self) -> &'static str {
        "sqlite"
    }

    fn flavor(&self) -> SinkFlavor {
        SinkFlavor::Sqlite
    }

    #[tracing::instrument(skip(self))]
    fn connect(&self, path: &str) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(SqliteConnection::open(path)?))
    }
}
