//! In-memory implementation of RecordStore for testing and development

use crate::core::field::{KeyRef, RecordKey};
use crate::core::query::Query;
use crate::core::store::{Record, RecordStore};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct StoreState {
    kinds: HashMap<String, BTreeMap<RecordKey, Record>>,
    next_ids: HashMap<String, i64>,
}

/// In-memory record store
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryRecordStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of `kind`
    pub fn count(&self, kind: &str) -> usize {
        self.state
            .read()
            .map(|state| state.kinds.get(kind).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &KeyRef) -> Result<Option<Record>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(state
            .kinds
            .get(&key.kind)
            .and_then(|records| records.get(&key.key))
            .cloned())
    }

    async fn allocate_key(&self, kind: &str) -> Result<RecordKey> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let StoreState { kinds, next_ids } = &mut *state;
        let next = next_ids.entry(kind.to_string()).or_insert(1);
        let existing = kinds.get(kind);

        // Literal integer keys may already occupy the next id
        while existing.is_some_and(|records| records.contains_key(&RecordKey::Id(*next))) {
            *next += 1;
        }
        let id = *next;
        *next += 1;

        Ok(RecordKey::Id(id))
    }

    async fn put(&self, record: Record) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        state
            .kinds
            .entry(record.kind.clone())
            .or_default()
            .insert(record.key.clone(), record);

        Ok(())
    }

    async fn delete_multi(&self, keys: &[KeyRef]) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        for key in keys {
            if let Some(records) = state.kinds.get_mut(&key.kind) {
                records.remove(&key.key);
            }
        }

        Ok(())
    }

    async fn fetch(
        &self,
        query: &Query,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Record>> {
        let state = self
            .state
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let Some(records) = state.kinds.get(&query.kind) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<&Record> = records.values().filter(|r| query.matches(r)).collect();
        matches.sort_by(|a, b| query.compare(a, b));

        Ok(matches
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
