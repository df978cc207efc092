//! Per-table sync driver
//!
//! Each table walks `SCHEMA_FETCHED -> TABLE_CREATED -> DATA_FETCHED ->
//! DATA_CONVERTED -> DATA_LOADED`. A failure stops that table only; the run
//! continues with the next one and the outcome lands in the `SyncReport`.

use std::sync::Arc;
use std::time::Instant;

use snowcopy_core::{
    ColumnDescriptor, Connection, LocalColumnSpec, SnowcopyError, TableSpec, WarehouseSource,
};
use snowcopy_drivers::DriverRegistry;
use uuid::Uuid;

use crate::{
    ColumnPlan, ConnectionScope, LoadError, RowConverter, SyncConfig, SyncError, SyncReport,
    SyncResult, TableLoader, TableOutcome, TableReport, TableStage,
};

/// A local connection that is closed on drop when this scope opened it
struct ScopedConnection {
    connection: Arc<dyn Connection>,
    owned: bool,
}

impl ScopedConnection {
    fn owned(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            owned: true,
        }
    }

    fn borrowed(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            owned: false,
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        match self.connection.close() {
            Ok(()) => tracing::debug!(driver = self.connection.driver_name(), "Closed local store"),
            Err(e) => tracing::warn!(error = %e, "Failed to close local store"),
        }
    }
}

enum SinkScope<'a> {
    Shared(&'a Arc<dyn Connection>),
    PerTable,
}

type StageFailure = (TableStage, SyncError);

pub struct TableSyncer {
    config: SyncConfig,
    source: Arc<dyn WarehouseSource>,
    registry: DriverRegistry,
    converter: RowConverter,
}

impl TableSyncer {
    /// Validates the configuration; sinks come from the built-in driver registry
    pub fn new(config: SyncConfig, source: Arc<dyn WarehouseSource>) -> SyncResult<Self> {
        config.validate()?;
        let converter = RowConverter::new(config.type_mapper());
        Ok(Self {
            config,
            source,
            registry: DriverRegistry::with_defaults(),
            converter,
        })
    }

    /// Replaces the sink drivers used to open local stores
    pub fn with_registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync every configured table into the configured sink.
    ///
    /// Only a shared sink that cannot be opened fails the run as a whole;
    /// everything else is recorded per table.
    pub fn run(&self) -> SyncResult<SyncReport> {
        let run_id = Uuid::new_v4();
        let sink = &self.config.sink;
        tracing::info!(
            %run_id,
            source = self.source.source_name(),
            flavor = %sink.flavor,
            path = %sink.path,
            scope = ?self.config.connection_scope,
            tables = self.config.tables.len(),
            "Starting sync"
        );

        let report = match self.config.connection_scope {
            ConnectionScope::Shared => {
                let connection = self
                    .registry
                    .connect(sink.flavor, &sink.path)
                    .map_err(|source| SyncError::Sink {
                        table: sink.path.clone(),
                        source,
                    })?;
                let scoped = ScopedConnection::owned(connection);
                self.run_tables(run_id, &SinkScope::Shared(&scoped.connection))
            }
            ConnectionScope::PerTable => self.run_tables(run_id, &SinkScope::PerTable),
        };

        tracing::info!(
            %run_id,
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            rows = report.total_rows(),
            "Sync finished"
        );
        Ok(report)
    }

    /// Sync every configured table into an already open connection, which
    /// stays open afterwards.
    pub fn sync_into(&self, connection: &Arc<dyn Connection>) -> SyncResult<SyncReport> {
        if connection.flavor() != self.config.sink.flavor {
            return Err(SyncError::InvalidConfig(format!(
                "connection is {} but the sync is configured for {}",
                connection.flavor(),
                self.config.sink.flavor
            )));
        }
        Ok(self.run_tables(Uuid::new_v4(), &SinkScope::Shared(connection)))
    }

    fn run_tables(&self, run_id: Uuid, scope: &SinkScope<'_>) -> SyncReport {
        let mut report = SyncReport::new(run_id, self.config.sink.flavor);
        for table in &self.config.tables {
            report.tables.push(self.sync_table(table, scope, run_id));
        }
        report
    }

    fn sync_table(&self, table: &TableSpec, scope: &SinkScope<'_>, run_id: Uuid) -> TableReport {
        let span = tracing::info_span!("sync_table", table = %table.name, %run_id);
        let _guard = span.enter();
        let started = Instant::now();

        let mut report = TableReport::new(&table.name);
        match self.try_sync_table(&table.name, scope, &mut report) {
            Ok(()) => tracing::info!(
                rows = report.rows_loaded,
                nulled_cells = report.nulled_cells,
                fallback_columns = report.fallback_columns.len(),
                "Table synced"
            ),
            Err((stage, error)) => {
                tracing::error!(stage = %stage, error = %error, "Table sync failed");
                report.outcome = TableOutcome::Failed {
                    stage,
                    error: error.to_string(),
                };
            }
        }
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        report
    }

    fn try_sync_table(
        &self,
        name: &str,
        scope: &SinkScope<'_>,
        report: &mut TableReport,
    ) -> Result<(), StageFailure> {
        let columns = self.source.describe_table(name).map_err(|source| {
            (
                TableStage::SchemaFetched,
                SyncError::SchemaFetch {
                    table: name.to_string(),
                    source,
                },
            )
        })?;
        let plans = self.converter.plan(&columns);
        let schema: Vec<LocalColumnSpec> = plans.iter().map(ColumnPlan::local_spec).collect();
        report.fallback_columns = plans
            .iter()
            .filter(|p| p.is_fallback)
            .map(|p| p.name.clone())
            .collect();
        tracing::debug!(stage = %TableStage::SchemaFetched, columns = columns.len());

        let connection = self.acquire(scope).map_err(|source| {
            (
                TableStage::TableCreated,
                SyncError::Sink {
                    table: name.to_string(),
                    source,
                },
            )
        })?;
        let loader = TableLoader::new(Arc::clone(&connection.connection));
        loader.create_table(name, &schema).map_err(|source| {
            (
                TableStage::TableCreated,
                SyncError::CreateTable {
                    table: name.to_string(),
                    source,
                },
            )
        })?;
        tracing::debug!(stage = %TableStage::TableCreated);

        let fetched = self.source.select_all(name).map_err(|source| {
            (
                TableStage::DataFetched,
                SyncError::DataFetch {
                    table: name.to_string(),
                    source,
                },
            )
        })?;
        tracing::debug!(stage = %TableStage::DataFetched, rows = fetched.len());

        check_header(name, &columns, &fetched.column_names)
            .map_err(|e| (TableStage::DataConverted, SyncError::Load(e)))?;
        let mut converted = Vec::with_capacity(fetched.rows.len());
        for (row_index, row) in fetched.rows.into_iter().enumerate() {
            let result = self.converter.convert_row(row, &plans);
            for (column_index, error) in &result.nulled {
                if let Some(plan) = plans.get(*column_index) {
                    tracing::warn!(
                        row = row_index,
                        column = %plan.name,
                        remote_type = %plan.remote_type,
                        reason = %error,
                        "Cell could not be converted, storing NULL"
                    );
                }
            }
            report.nulled_cells += result.nulled.len() as u64;
            converted.push(result.values);
        }
        tracing::debug!(stage = %TableStage::DataConverted, nulled_cells = report.nulled_cells);

        report.rows_loaded = loader
            .load_rows(name, &schema, &converted)
            .map_err(|e| (TableStage::DataLoaded, SyncError::Load(e)))?;
        Ok(())
    }

    fn acquire(&self, scope: &SinkScope<'_>) -> Result<ScopedConnection, SnowcopyError> {
        match scope {
            SinkScope::Shared(connection) => Ok(ScopedConnection::borrowed(Arc::clone(connection))),
            SinkScope::PerTable => {
                let sink = &self.config.sink;
                let connection = self.registry.connect(sink.flavor, &sink.path)?;
                tracing::debug!(path = %sink.path, "Opened local store for table");
                Ok(ScopedConnection::owned(connection))
            }
        }
    }
}

/// The fetched header must have one name per described column; differing
/// names only warn since rows are aligned by position.
fn check_header(
    table: &str,
    columns: &[ColumnDescriptor],
    column_names: &[String],
) -> Result<(), LoadError> {
    if column_names.len() != columns.len() {
        return Err(LoadError::ArityMismatch {
            table: table.to_string(),
            location: "result header".to_string(),
            expected: columns.len(),
            actual: column_names.len(),
        });
    }
    for (described, fetched) in columns.iter().zip(column_names) {
        if !described.name.eq_ignore_ascii_case(fetched) {
            tracing::warn!(
                described = %described.name,
                fetched = %fetched,
                "Fetched column name differs from described schema"
            );
        }
    }
    Ok(())
}
