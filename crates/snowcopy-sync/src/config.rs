//! Sync job configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use snowcopy_core::{SinkFlavor, TableSpec};

use crate::{DEFAULT_INTEGER_PRECISION_LIMIT, LargeIntegerPolicy, SyncError, SyncResult, TypeMapper};

/// How long a local connection lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionScope {
    /// Open and close the local store around each table
    #[default]
    PerTable,
    /// One local connection for the whole run
    Shared,
}

/// Destination store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub flavor: SinkFlavor,
    /// Database file, or `:memory:`
    pub path: String,
}

impl SinkConfig {
    pub fn new(flavor: SinkFlavor, path: impl Into<String>) -> Self {
        Self {
            flavor,
            path: path.into(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::new(SinkFlavor::Sqlite, "snowcopy.db")
    }
}

fn default_integer_precision_limit() -> u32 {
    DEFAULT_INTEGER_PRECISION_LIMIT
}

/// Everything the pipeline needs, built once by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote tables, synced in this order
    #[serde(default)]
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub connection_scope: ConnectionScope,
    #[serde(default)]
    pub large_integer_policy: LargeIntegerPolicy,
    #[serde(default = "default_integer_precision_limit")]
    pub integer_precision_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            sink: SinkConfig::default(),
            connection_scope: ConnectionScope::default(),
            large_integer_policy: LargeIntegerPolicy::default(),
            integer_precision_limit: DEFAULT_INTEGER_PRECISION_LIMIT,
        }
    }
}

impl SyncConfig {
    pub fn new(sink: SinkConfig) -> Self {
        Self {
            sink,
            ..Default::default()
        }
    }

    /// Replaces the table list
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(TableSpec::new).collect();
        self
    }

    /// Appends one table
    pub fn add_table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(TableSpec::new(table));
        self
    }

    pub fn with_connection_scope(mut self, scope: ConnectionScope) -> Self {
        self.connection_scope = scope;
        self
    }

    pub fn with_large_integer_policy(mut self, policy: LargeIntegerPolicy) -> Self {
        self.large_integer_policy = policy;
        self
    }

    pub fn with_integer_precision_limit(mut self, limit: u32) -> Self {
        self.integer_precision_limit = limit;
        self
    }

    /// Mapper for the configured sink and integer policy
    pub fn type_mapper(&self) -> TypeMapper {
        TypeMapper::new(self.sink.flavor)
            .with_large_integer_policy(self.large_integer_policy)
            .with_integer_precision_limit(self.integer_precision_limit)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.tables.is_empty() {
            return Err(SyncError::InvalidConfig("no tables configured".to_string()));
        }
        let mut seen = HashSet::new();
        for table in &self.tables {
            let name = table.name.trim();
            if name.is_empty() {
                return Err(SyncError::InvalidConfig("table name is blank".to_string()));
            }
            if !seen.insert(name.to_uppercase()) {
                return Err(SyncError::InvalidConfig(format!(
                    "table '{}' is listed more than once",
                    name
                )));
            }
        }
        if self.sink.path.trim().is_empty() {
            return Err(SyncError::InvalidConfig("sink path is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.connection_scope, ConnectionScope::PerTable);
        assert_eq!(config.large_integer_policy, LargeIntegerPolicy::Text);
        assert_eq!(config.integer_precision_limit, 18);
        assert_eq!(config.sink.flavor, SinkFlavor::Sqlite);
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new(SinkConfig::new(SinkFlavor::DuckDb, "local.duckdb"))
            .with_tables(["CUSTOMERS", "ORDERS"])
            .add_table("PICKS")
            .with_connection_scope(ConnectionScope::Shared);
        let names: Vec<&str> = config.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["CUSTOMERS", "ORDERS", "PICKS"]);
        assert_eq!(config.connection_scope, ConnectionScope::Shared);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_table_lists() {
        let base = SyncConfig::default();
        assert!(base.clone().validate().is_err());
        assert!(base.clone().with_tables([" "]).validate().is_err());
        assert!(base.clone().with_tables(["A", "a"]).validate().is_err());
        assert!(
            SyncConfig::new(SinkConfig::new(SinkFlavor::Sqlite, ""))
                .with_tables(["A"])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: SyncConfig = serde_json::from_str(
            r#"{
                "tables": ["CUSTOMERS"],
                "sink": {"flavor": "duckdb", "path": "out.duckdb"},
                "connection_scope": "shared",
                "large_integer_policy": "integer"
            }"#,
        )
        .unwrap();
        assert_eq!(config.tables, vec![TableSpec::new("CUSTOMERS")]);
        assert_eq!(config.sink, SinkConfig::new(SinkFlavor::DuckDb, "out.duckdb"));
        assert_eq!(config.connection_scope, ConnectionScope::Shared);
        assert_eq!(config.large_integer_policy, LargeIntegerPolicy::Integer);
        assert_eq!(config.integer_precision_limit, 18);
    }

    #[test]
    fn test_type_mapper_follows_config() {
        let config = SyncConfig::new(SinkConfig::new(SinkFlavor::DuckDb, "x"))
            .with_large_integer_policy(LargeIntegerPolicy::Integer);
        let mapper = config.type_mapper();
        assert_eq!(mapper.flavor(), SinkFlavor::DuckDb);
        assert_eq!(mapper.large_integer_policy(), LargeIntegerPolicy::Integer);
    }
}
