//! Per-run and per-table outcome reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use snowcopy_core::SinkFlavor;
use uuid::Uuid;

/// Per-table pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStage {
    SchemaFetched,
    TableCreated,
    DataFetched,
    DataConverted,
    DataLoaded,
}

impl TableStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStage::SchemaFetched => "SCHEMA_FETCHED",
            TableStage::TableCreated => "TABLE_CREATED",
            TableStage::DataFetched => "DATA_FETCHED",
            TableStage::DataConverted => "DATA_CONVERTED",
            TableStage::DataLoaded => "DATA_LOADED",
        }
    }
}

impl std::fmt::Display for TableStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Loaded,
    /// `stage` is the stage that could not be reached
    Failed { stage: TableStage, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub outcome: TableOutcome,
    pub rows_loaded: u64,
    /// Columns whose remote type fell back to TEXT
    pub fallback_columns: Vec<String>,
    /// Cells nulled because they could not be converted
    pub nulled_cells: u64,
    pub elapsed_ms: u64,
}

impl TableReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            outcome: TableOutcome::Loaded,
            rows_loaded: 0,
            fallback_columns: Vec::new(),
            nulled_cells: 0,
            elapsed_ms: 0,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.outcome == TableOutcome::Loaded
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub flavor: SinkFlavor,
    pub started_at: DateTime<Utc>,
    pub tables: Vec<TableReport>,
}

impl SyncReport {
    pub fn new(run_id: Uuid, flavor: SinkFlavor) -> Self {
        Self {
            run_id,
            flavor,
            started_at: Utc::now(),
            tables: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> Vec<&TableReport> {
        self.tables.iter().filter(|t| t.is_loaded()).collect()
    }

    pub fn failed(&self) -> Vec<&TableReport> {
        self.tables.iter().filter(|t| !t.is_loaded()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.tables.iter().all(TableReport::is_loaded)
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Process exit status: 0 when every table loaded, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_loaded).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
