use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use klaxon_store::{DurableStore, ListRange};

use crate::clock::TimeSource;
use crate::config::AlarmConfig;
use crate::error::{AlarmError, Result};
use crate::parser::PayloadParser;
use crate::registry::TaskRegistry;
use crate::types::{Invocation, PendingAlarm, TaskKind, TaskRecord};

/// User callback invoked once per due task.
///
/// Implementations must be `Send + Sync`; the dispatcher drives them
/// strictly sequentially within a wake, so handler side effects stay
/// ordered. Errors are caught per task and turn into a retry — they never
/// abort the rest of the batch. Delivery is at-least-once; idempotency is
/// the handler's responsibility (the `original_id` on the invocation is the
/// stable key to dedupe on).
#[async_trait]
pub trait AlarmHandler<T>: Send + Sync {
    async fn handle(&self, invocation: Invocation<T>) -> anyhow::Result<()>;
}

/// One scheduler partition: the public scheduling surface plus the wake
/// dispatch entry point, multiplexing every task onto the store's single
/// wake slot.
///
/// The host must serialize all calls against a partition — no two
/// operations on the same partition run concurrently.
pub struct AlarmManager<P, H> {
    pub(crate) registry: TaskRegistry,
    pub(crate) parser: P,
    pub(crate) handler: H,
    pub(crate) config: AlarmConfig,
    pub(crate) clock: Arc<dyn TimeSource>,
}

impl<P, H> AlarmManager<P, H>
where
    P: PayloadParser,
    H: AlarmHandler<P::Payload>,
{
    pub fn new(
        store: Arc<dyn DurableStore>,
        parser: P,
        handler: H,
        config: AlarmConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            registry: TaskRegistry::new(store),
            parser,
            handler,
            config,
            clock,
        }
    }

    /// Schedule a one-shot task at an absolute unix-millisecond instant.
    pub async fn schedule_at(&self, at_ms: i64, payload: Value) -> Result<String> {
        self.schedule(at_ms, TaskKind::At { at: at_ms }, payload)
            .await
    }

    /// Schedule a one-shot task `after_ms` milliseconds from now.
    pub async fn schedule_in(&self, after_ms: u64, payload: Value) -> Result<String> {
        let due_ms = self.due_after(after_ms)?;
        self.schedule(due_ms, TaskKind::In { after_ms }, payload)
            .await
    }

    /// Schedule a recurring task. First fire is one interval from now; it
    /// keeps firing after each success until cancelled.
    pub async fn schedule_every(&self, interval_ms: u64, payload: Value) -> Result<String> {
        let due_ms = self.due_after(interval_ms)?;
        self.schedule(due_ms, TaskKind::Every { interval_ms }, payload)
            .await
    }

    async fn schedule(&self, due_ms: i64, kind: TaskKind, payload: Value) -> Result<String> {
        // Fail fast: nothing is written when the payload does not conform.
        self.parser.parse(&payload)?;

        let id = self.registry.put(due_ms, kind, payload, None).await?;
        self.registry.recompute_wake().await?;
        info!(task_id = %id, due_ms, "task scheduled");
        Ok(id)
    }

    fn due_after(&self, offset_ms: u64) -> Result<i64> {
        let offset = i64::try_from(offset_ms)
            .map_err(|_| AlarmError::BadId(format!("offset too large: {offset_ms}")))?;
        Ok(self.clock.now_ms().saturating_add(offset))
    }

    /// Cancel a task by its stable id. Returns `true` exactly once per live
    /// task; unknown or already-finished ids return `false`.
    pub async fn cancel(&self, original_id: &str) -> Result<bool> {
        let cancelled = self.registry.cancel(original_id).await?;
        if cancelled {
            // The cancelled task may have owned the earliest due time.
            self.registry.recompute_wake().await?;
        }
        Ok(cancelled)
    }

    /// Cancel every pending task and disarm the wake register.
    pub async fn cancel_all(&self) -> Result<usize> {
        self.registry.cancel_all().await
    }

    /// The pending task with the globally smallest due time, or `None`.
    pub async fn next_alarm(&self) -> Result<Option<PendingAlarm>> {
        let Some(task) = self.registry.get_next().await? else {
            return Ok(None);
        };
        let due_ms = task.due_ms()?;
        Ok(Some(PendingAlarm {
            remaining_ms: due_ms - self.clock.now_ms(),
            due_ms,
            task,
        }))
    }

    /// Raw record listing over an id range — the inspection surface.
    pub async fn list_alarms(&self, range: ListRange) -> Result<Vec<TaskRecord>> {
        self.registry.list(range).await
    }
}
