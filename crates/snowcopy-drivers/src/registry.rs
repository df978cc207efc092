//! Registry of the sink drivers compiled into this build

use std::collections::HashMap;
use std::sync::Arc;

use snowcopy_core::{Connection, Result, SinkDriver, SinkFlavor, SnowcopyError};

/// Sink drivers keyed by flavor
pub struct DriverRegistry {
    drivers: HashMap<SinkFlavor, Arc<dyn SinkDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Registry with every built-in sink registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "duckdb")]
        registry.register(Arc::new(crate::duckdb::DuckDbDriver::new()));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn SinkDriver>) {
        tracing::debug!(driver = driver.id(), "registering sink driver");
        self.drivers.insert(driver.flavor(), driver);
    }

    pub fn get(&self, flavor: SinkFlavor) -> Option<Arc<dyn SinkDriver>> {
        let driver = self.drivers.get(&flavor).cloned();
        if driver.is_none() {
            tracing::warn!(flavor = %flavor, "sink driver not compiled in");
        }
        driver
    }

    pub fn has(&self, flavor: SinkFlavor) -> bool {
        self.drivers.contains_key(&flavor)
    }

    /// Ids of the registered drivers, sorted
    pub fn list(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.drivers.values().map(|d| d.id()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn connect(&self, flavor: SinkFlavor, path: &str) -> Result<Arc<dyn Connection>> {
        let driver = self.get(flavor).ok_or_else(|| {
            SnowcopyError::NotSupported(format!("{} sink is not available in this build", flavor))
        })?;
        driver.connect(path)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Open a local store of the given flavor at `path` (`:memory:` allowed)
pub fn open_sink(flavor: SinkFlavor, path: &str) -> Result<Arc<dyn Connection>> {
    DriverRegistry::with_defaults().connect(flavor, path)
}
