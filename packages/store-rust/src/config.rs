/// Behavior switches shared by every collection opened from one context.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Validate `batch_write` creates and updates against the schema.
    /// When `false`, batches take the unchecked fast path.
    pub validate_batch_writes: bool,
    /// Attempts before a conflicting transaction gives up. Minimum 1.
    pub transaction_max_attempts: u32,
    /// Run the self-heal backfill when a registry opens a collection.
    pub heal_on_open: bool,
    /// Partition that [`StoreLogSink`](crate::storage::StoreLogSink) appends to.
    pub log_partition: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            validate_batch_writes: true,
            transaction_max_attempts: 5,
            heal_on_open: true,
            log_partition: "logs".to_string(),
        }
    }
}
