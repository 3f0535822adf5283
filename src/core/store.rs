//! Records and the store interface the engine persists through

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;

use crate::core::field::{FieldValue, KeyRef, RecordKey};
use crate::core::query::Query;

static NULL: FieldValue = FieldValue::Null;

/// A stored instance of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: String,
    pub key: RecordKey,
    pub values: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn new(kind: impl Into<String>, key: RecordKey) -> Self {
        Self {
            kind: kind.into(),
            key,
            values: IndexMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    /// Stored value of `field`; unset fields read as null
    pub fn value(&self, field: &str) -> &FieldValue {
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    /// Typed pointer to this record
    pub fn key_ref(&self) -> KeyRef {
        KeyRef::new(self.kind.clone(), self.key.clone())
    }
}

/// Persistent record store
///
/// Implementations must be safe to share between requests. Failures are
/// reported through `anyhow` and surface as storage errors.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a record by typed key
    async fn get(&self, key: &KeyRef) -> Result<Option<Record>>;

    /// Reserve a fresh integer key for `kind`
    async fn allocate_key(&self, kind: &str) -> Result<RecordKey>;

    /// Insert or overwrite a record under its key
    async fn put(&self, record: Record) -> Result<()>;

    /// Delete every listed key; missing keys are not an error
    async fn delete_multi(&self, keys: &[KeyRef]) -> Result<()>;

    /// Run a query, skipping `offset` matches and returning at most `limit`
    async fn fetch(&self, query: &Query, limit: Option<usize>, offset: usize)
    -> Result<Vec<Record>>;
}
