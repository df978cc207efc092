//! SQLite sink driver
//!
//! SQLite has no native date or boolean storage, so temporal values are
//! written as ISO-8601 text and booleans as 0/1. Reads use each column's
//! declared type to turn them back into typed values.

mod connection;
#[cfg(test)]
mod connection_tests;
mod driver;

pub use connection::{SqliteConnection, SqliteTransaction};
pub use driver::SqliteDriver;
