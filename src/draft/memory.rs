use dashmap::DashMap;

use crate::draft::{DraftResult, DraftStore};

/// In-memory [`DraftStore`] backend used by the test suites.
#[derive(Default)]
pub struct MemoryDraftStore {
    entries: DashMap<String, serde_json::Value>,
}

impl MemoryDraftStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are currently stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, key: &str, value: &serde_json::Value) -> DraftResult<()> {
        self.entries.insert(key.into(), value.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> DraftResult<Option<serde_json::Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn clear(&self, key: &str) -> DraftResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
