//! Snowflake warehouse source
//!
//! Talks to the Snowflake SQL API v2 over blocking HTTP. Statements are
//! submitted with the configured warehouse/database/schema/role context,
//! asynchronous executions are polled until they finish, and every result
//! partition is fetched and decoded into `Value`s using the column metadata
//! the API reports.

mod config;
mod decode;
mod source;
#[cfg(test)]
mod source_tests;
mod transport;
mod wire;

pub use config::{SnowflakeConfig, TokenType};
pub use decode::decode_cell;
pub use source::{ResultSet, SnowflakeSource, validate_object_name};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
pub use wire::{PartitionInfo, ResultSetMetaData, RowType, StatementRequest, StatementResponse};
