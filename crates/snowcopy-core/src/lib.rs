//! snowcopy core - shared abstractions for warehouse-to-local replication
//!
//! This crate provides the fundamental traits and types that the drivers
//! and the sync pipeline depend on. It defines:
//!
//! - `Connection` / `Transaction` - the local sink contract
//! - `SinkDriver` - opens sink connections
//! - `WarehouseSource` - the remote source contract
//! - `SinkFlavor` - which embedded store a sink is, and what it can store natively
//! - Common types like `Value`, `Row`, `ColumnDescriptor`, `LocalType`

mod connection;
mod driver;
mod error;
mod schema;
mod sink;
mod source;
pub mod temporal;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use schema::*;
pub use sink::*;
pub use source::*;
pub use types::*;
