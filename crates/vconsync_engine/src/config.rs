//! Configuration for the replication engine.

/// Default key namespace prefix replicated from the source store.
pub const DEFAULT_KEY_PREFIX: &str = "vcon:";

/// Configuration for the replication engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Key namespace prefix replicated from the source store.
    pub key_prefix: String,
    /// Source database index; determines the notification channel
    /// namespace.
    pub database: u32,
    /// Page-size hint for the reconciliation scan.
    pub scan_page_size: usize,
}

impl EngineConfig {
    /// Creates a configuration for the given key prefix.
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            database: 0,
            scan_page_size: 100,
        }
    }

    /// Sets the source database index.
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    /// Sets the scan page-size hint.
    pub fn with_scan_page_size(mut self, size: usize) -> Self {
        self.scan_page_size = size;
        self
    }

    /// Key pattern for the reconciliation scan, e.g. `vcon:*`.
    pub fn scan_pattern(&self) -> String {
        format!("{}*", self.key_prefix)
    }

    /// Channel pattern for the change subscription, joining the source
    /// store's per-database notification namespace with the key prefix,
    /// e.g. `__keyspace@0__:vcon:*`.
    pub fn channel_pattern(&self) -> String {
        format!("__keyspace@{}__:{}*", self.database, self.key_prefix)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}
