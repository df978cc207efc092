//! Local store flavors and what they can persist natively

use serde::{Deserialize, Serialize};

use crate::SnowcopyError;

/// The embedded store a sink writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFlavor {
    /// Row store with date and boolean emulation
    Sqlite,
    /// Columnar analytic store with native typing
    DuckDb,
}

impl SinkFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkFlavor::Sqlite => "sqlite",
            SinkFlavor::DuckDb => "duckdb",
        }
    }

    pub fn capabilities(&self) -> SinkCapabilities {
        match self {
            SinkFlavor::Sqlite => SinkCapabilities {
                native_temporal: false,
                native_boolean: false,
            },
            SinkFlavor::DuckDb => SinkCapabilities {
                native_temporal: true,
                native_boolean: true,
            },
        }
    }
}

impl std::fmt::Display for SinkFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SinkFlavor {
    type Err = SnowcopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(SinkFlavor::Sqlite),
            "duckdb" | "duck" => Ok(SinkFlavor::DuckDb),
            other => Err(SnowcopyError::Configuration(format!(
                "unknown sink flavor '{}', expected 'sqlite' or 'duckdb'",
                other
            ))),
        }
    }
}

/// Storage features a sink flavor supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkCapabilities {
    /// DATE and TIMESTAMP columns hold real temporal values
    pub native_temporal: bool,
    /// BOOLEAN columns hold real booleans rather than 0/1
    pub native_boolean: bool,
}
