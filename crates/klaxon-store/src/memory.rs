use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::store::{DurableStore, ListRange};

/// In-memory store backed by a sorted map.
///
/// State lives only as long as the process; the backend exists for tests and
/// for embedders that accept losing scheduled work on restart. The wake slot
/// can be inspected directly via [`DurableStore::get_wake`] to assert what
/// the host would be armed with.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Value>,
    wake: Option<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, across all key namespaces.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.entries.remove(key).is_some())
    }

    async fn list(&self, range: ListRange) -> Result<Vec<(String, Value)>> {
        let inner = self.inner.lock().unwrap();
        let limit = range.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();

        for (key, value) in inner.entries.iter() {
            if out.len() >= limit {
                break;
            }
            if let Some(ref start) = range.start {
                if key < start {
                    continue;
                }
            }
            // Entries are iterated in ascending order, so the first key at or
            // past the exclusive end terminates the scan.
            if let Some(ref end) = range.end {
                if key >= end {
                    break;
                }
            }
            if let Some(ref prefix) = range.prefix {
                if !key.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            out.push((key.clone(), value.clone()));
        }
        Ok(out)
    }

    async fn set_wake(&self, at_ms: Option<i64>) -> Result<()> {
        self.inner.lock().unwrap().wake = at_ms;
        Ok(())
    }

    async fn get_wake(&self) -> Result<Option<i64>> {
        Ok(self.inner.lock().unwrap().wake)
    }
}
