//! Sink driver trait

use std::sync::Arc;

use crate::{Connection, Result, SinkFlavor};

/// Opens connections to one kind of local store
pub trait SinkDriver: Send + Sync {
    /// Driver identifier (e.g., "sqlite")
    fn id(&self) -> &'static str;

    fn flavor(&self) -> SinkFlavor;

    /// Open (creating if needed) the store at `path`; `:memory:` opens an
    /// in-memory database
    fn connect(&self, path: &str) -> Result<Arc<dyn Connection>>;
}
