//! snowcopy drivers
//!
//! Concrete sinks and sources for the traits in `snowcopy-core`, each behind
//! a cargo feature.

#[cfg(feature = "duckdb")]
pub use snowcopy_driver_duckdb as duckdb;
#[cfg(feature = "snowflake")]
pub use snowcopy_driver_snowflake as snowflake;
#[cfg(feature = "sqlite")]
pub use snowcopy_driver_sqlite as sqlite;

mod registry;

pub use registry::{DriverRegistry, open_sink};

pub use snowcopy_core::{
    Connection, QueryResult, Result, Row, SinkDriver, SinkFlavor, SnowcopyError, Transaction,
    Value, WarehouseSource,
};
