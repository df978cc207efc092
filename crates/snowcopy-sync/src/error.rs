//! Error types for the sync pipeline

use snowcopy_core::{LocalType, SnowcopyError};
use thiserror::Error;

/// A cell that could not be coerced to its column's local type.
///
/// Never propagated out of a batch: the cell becomes NULL and the failure is
/// logged and counted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("'{value}' is not a boolean")]
    InvalidBoolean { value: String },

    #[error("'{value}' is not a number")]
    InvalidNumber { value: String },

    #[error("{value} does not fit in a 64-bit integer")]
    IntegerOverflow { value: String },

    #[error("'{value}' is not a valid {expected}")]
    InvalidTemporal { value: String, expected: &'static str },

    #[error("{kind} value cannot be stored as {target}")]
    UnexpectedValue { kind: &'static str, target: LocalType },
}

/// An insert the loader refused or the store rejected
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("table '{table}': {location} has {actual} values, expected {expected}")]
    ArityMismatch {
        table: String,
        /// `row N` or `result header`
        location: String,
        expected: usize,
        actual: usize,
    },

    #[error("table '{table}': row {row}, column '{column}' holds a {kind} value, incompatible with {local_type}")]
    TypeMismatch {
        table: String,
        row: usize,
        column: String,
        kind: &'static str,
        local_type: LocalType,
    },

    #[error("table '{table}': {source}")]
    Store {
        table: String,
        #[source]
        source: SnowcopyError,
    },
}

impl LoadError {
    pub fn table(&self) -> &str {
        match self {
            LoadError::ArityMismatch { table, .. }
            | LoadError::TypeMismatch { table, .. }
            | LoadError::Store { table, .. } => table,
        }
    }
}

/// Errors that can occur while syncing
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch schema of '{table}': {source}")]
    SchemaFetch {
        table: String,
        #[source]
        source: SnowcopyError,
    },

    #[error("failed to create local table '{table}': {source}")]
    CreateTable {
        table: String,
        #[source]
        source: SnowcopyError,
    },

    #[error("failed to fetch rows of '{table}': {source}")]
    DataFetch {
        table: String,
        #[source]
        source: SnowcopyError,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("local store unavailable for '{table}': {source}")]
    Sink {
        table: String,
        #[source]
        source: SnowcopyError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
