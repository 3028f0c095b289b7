use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Bounds for an ordered key listing.
///
/// `start` is inclusive and `end` exclusive, matching the host storage API
/// this interface abstracts. `prefix` narrows the listing to keys that start
/// with the given string and composes with explicit bounds (the effective
/// range is the intersection).
#[derive(Debug, Clone, Default)]
pub struct ListRange {
    pub prefix: Option<String>,
    /// First key to include (inclusive).
    pub start: Option<String>,
    /// First key to exclude (exclusive).
    pub end: Option<String>,
    pub limit: Option<usize>,
}

impl ListRange {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Ordered key-value storage plus the host's single-slot wake register.
///
/// One scheduler partition owns one store and is its sole writer; the host
/// serializes all calls against a partition, so implementations only need
/// internal consistency, not cross-call transactions. Every method is a
/// suspension point.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a single value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a single value, overwriting any existing entry.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Returns `true` when an entry existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List entries in ascending lexicographic key order.
    async fn list(&self, range: ListRange) -> Result<Vec<(String, Value)>>;

    /// Set or clear the wake register. The host re-invokes the scheduler's
    /// wake callback at (or after) the registered time; `None` disarms it.
    async fn set_wake(&self, at_ms: Option<i64>) -> Result<()>;

    /// Current wake register value, if armed.
    async fn get_wake(&self) -> Result<Option<i64>>;
}

/// Smallest string strictly greater than every string starting with `prefix`.
///
/// Used to turn a prefix into an exclusive upper bound for range scans.
pub(crate) fn prefix_upper_bound(prefix: &str) -> String {
    let mut upper = String::with_capacity(prefix.len() + 4);
    upper.push_str(prefix);
    upper.push(char::MAX);
    upper
}
