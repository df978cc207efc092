//! Schema types shared by the mapper, the loader and the drivers

use serde::{Deserialize, Serialize};

use crate::{Result, SinkFlavor, SnowcopyError, Value};

/// One remote table to replicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSpec {
    pub name: String,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for TableSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A remote column as reported by the warehouse's introspection call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Trimmed, uppercased type string, e.g. `NUMBER(10,2)`
    pub remote_type: String,
}

impl ColumnDescriptor {
    /// Build a descriptor, normalizing the remote type string.
    ///
    /// Fails when the type string is blank.
    pub fn new(name: impl Into<String>, remote_type: &str) -> Result<Self> {
        let name = name.into();
        let remote_type = remote_type.trim().to_uppercase();
        if remote_type.is_empty() {
            return Err(SnowcopyError::Schema(format!(
                "column '{}' has an empty type",
                name
            )));
        }
        Ok(Self { name, remote_type })
    }
}

/// Column type declared in the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocalType {
    Text,
    Integer,
    Real,
    Date,
    DateTime,
    Boolean,
}

impl LocalType {
    /// Flavor-neutral name
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalType::Text => "TEXT",
            LocalType::Integer => "INTEGER",
            LocalType::Real => "REAL",
            LocalType::Date => "DATE",
            LocalType::DateTime => "DATETIME",
            LocalType::Boolean => "BOOLEAN",
        }
    }

    /// The type keyword used in `CREATE TABLE` for the given store
    pub fn declaration(&self, flavor: SinkFlavor) -> &'static str {
        match flavor {
            SinkFlavor::Sqlite => self.as_str(),
            SinkFlavor::DuckDb => match self {
                LocalType::Text => "VARCHAR",
                LocalType::Integer => "BIGINT",
                LocalType::Real => "DOUBLE",
                LocalType::Date => "DATE",
                LocalType::DateTime => "TIMESTAMP",
                LocalType::Boolean => "BOOLEAN",
            },
        }
    }

    /// Recognize a declared column type from either store's vocabulary
    pub fn from_declaration(declared: &str) -> Option<Self> {
        match declared.trim().to_uppercase().as_str() {
            "TEXT" | "VARCHAR" => Some(LocalType::Text),
            "INTEGER" | "BIGINT" => Some(LocalType::Integer),
            "REAL" | "DOUBLE" => Some(LocalType::Real),
            "DATE" => Some(LocalType::Date),
            "DATETIME" | "TIMESTAMP" => Some(LocalType::DateTime),
            "BOOLEAN" => Some(LocalType::Boolean),
            _ => None,
        }
    }

    /// Whether a converted value may be stored in a column of this type.
    ///
    /// Temporal columns take either native values or ISO-8601 strings and
    /// boolean columns take either native booleans or 0/1 integers, so the
    /// check holds for both store flavors.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (LocalType::Text, Value::String(_) | Value::Decimal(_)) => true,
            (LocalType::Integer, Value::Int64(_)) => true,
            (LocalType::Real, Value::Float64(_) | Value::Int64(_)) => true,
            (LocalType::Date, Value::Date(_) | Value::String(_)) => true,
            (LocalType::DateTime, Value::DateTime(_) | Value::String(_)) => true,
            (LocalType::Boolean, Value::Bool(_)) => true,
            (LocalType::Boolean, Value::Int64(v)) => *v == 0 || *v == 1,
            _ => false,
        }
    }
}

impl std::fmt::Display for LocalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local column derived from a `ColumnDescriptor`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalColumnSpec {
    pub name: String,
    pub local_type: LocalType,
}
