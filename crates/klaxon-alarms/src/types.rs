use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::id;

/// Defines when a task fires and whether it repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Fire once at an absolute unix-millisecond instant.
    At { at: i64 },

    /// Fire once, `after_ms` milliseconds after it was scheduled. The offset
    /// is retained for introspection; the actual due time lives in the id.
    In { after_ms: u64 },

    /// Fire repeatedly. Each interval is measured from the previous
    /// successful run, not from wall-clock multiples of the start time.
    Every { interval_ms: u64 },
}

impl TaskKind {
    pub fn is_recurring(&self) -> bool {
        matches!(self, TaskKind::Every { .. })
    }
}

/// One live instance of a scheduled task, as persisted in the record
/// namespace.
///
/// `id` is the storage key suffix and encodes the due time; it changes on
/// every retry or recurrence (delete-and-reinsert, never in-place update).
/// `original_id` is the stable logical identity handed back to callers and
/// used for cancellation; it equals `id` until the first requeue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub original_id: String,
    #[serde(flatten)]
    pub kind: TaskKind,
    /// Validated against the configured schema before the record was written.
    pub payload: Value,
    /// Number of completed handler invocations for the current cycle.
    /// Reset to zero when a recurring task succeeds.
    pub attempt: u32,
    /// Display form of the most recent handler failure, if the task is in a
    /// retry cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_error: Option<String>,
}

impl TaskRecord {
    /// Absolute due time, decoded from the record's id.
    pub fn due_ms(&self) -> Result<i64> {
        id::decode_ms(&self.id)
    }
}

/// What the dispatcher hands to the user handler for one invocation.
#[derive(Debug, Clone)]
pub struct Invocation<T> {
    pub payload: T,
    /// 1-based: the first invocation of a cycle sees `attempt == 1`.
    pub attempt: u32,
    /// Failure recorded by the previous attempt, if this is a retry.
    pub previous_error: Option<String>,
    /// Stable id for cancellation and idempotency bookkeeping.
    pub original_id: String,
}

/// The earliest pending task, as reported by `next_alarm`.
#[derive(Debug, Clone)]
pub struct PendingAlarm {
    pub task: TaskRecord,
    pub due_ms: i64,
    /// Milliseconds until due, relative to the scheduler's clock. Negative
    /// when the task is already overdue (wake not yet dispatched).
    pub remaining_ms: i64,
}
