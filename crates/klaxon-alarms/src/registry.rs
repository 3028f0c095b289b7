use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use klaxon_store::{DurableStore, ListRange};

use crate::error::Result;
use crate::id;
use crate::types::{TaskKind, TaskRecord};

/// Key namespace for task records, sorted by due-time-encoded id.
pub const TASK_PREFIX: &str = "$$_alarm##";
/// Key namespace for the `original_id -> current id` alias index.
pub const ALIAS_PREFIX: &str = "$$_alarm_alias##";

/// Durable CRUD over task records and the alias index.
///
/// Records are keyed by sortable id, so "earliest pending" is a limit-1
/// range read rather than a scan. The alias entry is a non-owning
/// back-reference: it points at the live instance of a logical task and is
/// repointed on every requeue; its absence means cancelled or completed.
///
/// The registry never touches the wake register on writes — callers decide
/// when to [`recompute_wake`](TaskRegistry::recompute_wake).
pub struct TaskRegistry {
    store: Arc<dyn DurableStore>,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    fn task_key(id: &str) -> String {
        format!("{TASK_PREFIX}{id}")
    }

    fn alias_key(original_id: &str) -> String {
        format!("{ALIAS_PREFIX}{original_id}")
    }

    /// Write a fresh task record due at `due_ms`. Returns the minted id,
    /// which doubles as the `original_id` for first-time schedules.
    pub async fn put(
        &self,
        due_ms: i64,
        kind: TaskKind,
        payload: Value,
        original_id: Option<&str>,
    ) -> Result<String> {
        self.write(due_ms, kind, payload, original_id, 0, None).await
    }

    /// Re-insert a processed task under a fresh id: retains the kind and
    /// payload, repoints the alias, and carries the given retry bookkeeping.
    /// The caller still owns deleting the predecessor record.
    pub async fn requeue(
        &self,
        due_ms: i64,
        previous: &TaskRecord,
        attempt: u32,
        previous_error: Option<String>,
    ) -> Result<String> {
        self.write(
            due_ms,
            previous.kind.clone(),
            previous.payload.clone(),
            Some(&previous.original_id),
            attempt,
            previous_error,
        )
        .await
    }

    async fn write(
        &self,
        due_ms: i64,
        kind: TaskKind,
        payload: Value,
        original_id: Option<&str>,
        attempt: u32,
        previous_error: Option<String>,
    ) -> Result<String> {
        let id = id::mint(due_ms)?;
        let original_id = original_id.unwrap_or(&id).to_string();
        let record = TaskRecord {
            id: id.clone(),
            original_id: original_id.clone(),
            kind,
            payload,
            attempt,
            previous_error,
        };

        self.store
            .put(&Self::task_key(&id), serde_json::to_value(&record)?)
            .await?;
        self.store
            .put(&Self::alias_key(&original_id), Value::String(id.clone()))
            .await?;
        debug!(task_id = %id, original_id = %original_id, due_ms, "task record written");
        Ok(id)
    }

    /// List records in ascending id (= due-time) order. `start` and `end`
    /// are id bounds (start inclusive, end exclusive), scoped into the
    /// record namespace here.
    pub async fn list(&self, range: ListRange) -> Result<Vec<TaskRecord>> {
        let scoped = ListRange {
            prefix: Some(TASK_PREFIX.to_string()),
            start: range.start.map(|s| format!("{TASK_PREFIX}{s}")),
            end: range.end.map(|e| format!("{TASK_PREFIX}{e}")),
            limit: range.limit,
        };
        let rows = self.store.list(scoped).await?;

        let mut records = Vec::with_capacity(rows.len());
        for (_, value) in rows {
            records.push(serde_json::from_value(value)?);
        }
        Ok(records)
    }

    /// Every record due strictly before `upto_exclusive_ms`, ascending.
    ///
    /// The upper bound is the smallest id encodable for that millisecond, so
    /// records due at `upto_exclusive_ms - 1` and earlier are all included
    /// regardless of their random id tails. `start_after` is an exclusive
    /// pagination cursor (the last id of the previous page).
    pub async fn list_due(
        &self,
        upto_exclusive_ms: i64,
        limit: Option<usize>,
        start_after: Option<&str>,
    ) -> Result<Vec<TaskRecord>> {
        let mut range = ListRange::default().end(id::lower_bound(upto_exclusive_ms)?);
        if let Some(cursor) = start_after {
            // The next representable key after the cursor makes the
            // inclusive start bound behave exclusively.
            range = range.start(format!("{cursor}\u{0}"));
        }
        if let Some(limit) = limit {
            range = range.limit(limit);
        }
        self.list(range).await
    }

    /// Earliest pending record, or `None` when nothing is scheduled.
    pub async fn get_next(&self) -> Result<Option<TaskRecord>> {
        let mut records = self.list(ListRange::default().limit(1)).await?;
        Ok(records.pop())
    }

    /// Point the wake register at the earliest pending due time, or clear
    /// it when no records remain so an empty store never produces a
    /// spurious wake. The register is never set later than the true
    /// minimum — under-waking would lose a task, over-waking is safe.
    pub async fn recompute_wake(&self) -> Result<()> {
        match self.get_next().await? {
            Some(task) => {
                let due_ms = task.due_ms()?;
                self.store.set_wake(Some(due_ms)).await?;
                debug!(due_ms, task_id = %task.id, "wake register armed");
            }
            None => {
                self.store.set_wake(None).await?;
                debug!("wake register cleared");
            }
        }
        Ok(())
    }

    /// Cancel the live instance of a logical task. Returns `false` when the
    /// alias is absent (already cancelled, or completed) — calling again
    /// with the same id is a no-op.
    pub async fn cancel(&self, original_id: &str) -> Result<bool> {
        let alias_key = Self::alias_key(original_id);
        let Some(alias) = self.store.get(&alias_key).await? else {
            return Ok(false);
        };
        let current_id: String = serde_json::from_value(alias)?;

        self.store.delete(&Self::task_key(&current_id)).await?;
        self.store.delete(&alias_key).await?;
        info!(original_id = %original_id, task_id = %current_id, "task cancelled");
        Ok(true)
    }

    /// Drop every record and alias and disarm the wake register. Returns
    /// how many live tasks were removed.
    pub async fn cancel_all(&self) -> Result<usize> {
        let records = self.list(ListRange::default()).await?;
        for record in &records {
            self.store.delete(&Self::task_key(&record.id)).await?;
            self.store.delete(&Self::alias_key(&record.original_id)).await?;
        }
        self.store.set_wake(None).await?;
        info!(count = records.len(), "all tasks cancelled");
        Ok(records.len())
    }

    /// Remove a single record by id, leaving the alias namespace alone.
    /// Dispatch uses this to drop the just-processed instance.
    pub async fn delete_record(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(&Self::task_key(id)).await?)
    }

    /// Remove the alias for a completed one-shot task.
    pub async fn delete_alias(&self, original_id: &str) -> Result<bool> {
        Ok(self.store.delete(&Self::alias_key(original_id)).await?)
    }
}
