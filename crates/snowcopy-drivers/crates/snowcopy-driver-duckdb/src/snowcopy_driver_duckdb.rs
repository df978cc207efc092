//! DuckDB sink driver
//!
//! DuckDB is an in-process analytical database. It stores DATE, TIMESTAMP
//! and BOOLEAN natively, so values are written and read back without any
//! text emulation.

mod driver;
#[cfg(test)]
mod driver_tests;

pub use driver::*;
