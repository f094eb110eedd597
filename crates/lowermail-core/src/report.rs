use serde::{Deserialize, Serialize};

/// Counters for one migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub collection: String,
    pub pages: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub committed: usize,
    pub failed_writes: usize,
    pub dry_run: bool,
}

impl MigrationReport {
    pub fn new(collection: impl Into<String>, dry_run: bool) -> Self {
        Self {
            collection: collection.into(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed_writes == 0
    }
}
