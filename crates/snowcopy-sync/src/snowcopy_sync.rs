//! snowcopy sync pipeline
//!
//! Replicates warehouse tables into a local SQLite or DuckDB store:
//! - `TypeMapper` turns remote type strings into local column types
//! - `RowConverter` coerces each fetched cell into a value the sink can store
//! - `TableLoader` creates the local table and bulk-inserts converted rows
//! - `TableSyncer` drives those steps per table and collects a `SyncReport`

mod config;
mod converter;
#[cfg(test)]
mod converter_tests;
mod error;
mod identifier;
mod loader;
#[cfg(test)]
mod loader_tests;
mod report;
mod syncer;
#[cfg(test)]
mod syncer_tests;
mod type_mapper;
#[cfg(test)]
mod type_mapper_tests;

pub use config::*;
pub use converter::*;
pub use error::*;
pub use identifier::*;
pub use loader::*;
pub use report::*;
pub use syncer::*;
pub use type_mapper::*;
