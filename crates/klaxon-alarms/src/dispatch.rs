//! The wake dispatcher: what runs when the host's wake callback fires.
//!
//! Per invocation: list everything due, run handlers strictly in due-time
//! order, requeue retries and recurrences under fresh ids, delete the
//! processed records, then re-arm the wake register from whatever remains.

use tracing::{debug, warn};

use crate::manager::{AlarmHandler, AlarmManager};
use crate::parser::PayloadParser;
use crate::types::{Invocation, TaskKind};

/// What a single wake accomplished. `ran == 0` means nothing was due —
/// e.g. a wake armed before the last remaining task was cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeOutcome {
    /// Due records processed, including ones whose handler failed.
    pub ran: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl WakeOutcome {
    pub fn nothing_ran(&self) -> bool {
        self.ran == 0
    }
}

impl<P, H> AlarmManager<P, H>
where
    P: PayloadParser,
    H: AlarmHandler<P::Payload>,
{
    /// Entry point for the host's wake callback.
    ///
    /// Handler failures are contained per task; only storage errors
    /// propagate, and a propagated storage error leaves earlier tasks'
    /// writes committed (no cross-task atomicity).
    pub async fn on_wake(&self) -> crate::error::Result<WakeOutcome> {
        let now_ms = self.clock.now_ms();
        // Exclusive bound one millisecond ahead, so tasks due exactly now
        // are included.
        let due = self.registry.list_due(now_ms + 1, None, None).await?;
        debug!(count = due.len(), now_ms, "wake fired");

        let mut outcome = WakeOutcome::default();
        for task in due {
            outcome.ran += 1;
            let attempt = task.attempt + 1;

            let Some(payload) = self.parser.safe_parse(&task.payload) else {
                // The schema moved underneath a stored payload. Retrying
                // can never succeed, so drop the task instead of wedging
                // the retry cycle.
                warn!(task_id = %task.id, original_id = %task.original_id,
                    "stored payload no longer parses; dropping task");
                self.registry.delete_alias(&task.original_id).await?;
                self.registry.delete_record(&task.id).await?;
                outcome.failed += 1;
                continue;
            };

            let invocation = Invocation {
                payload,
                attempt,
                previous_error: task.previous_error.clone(),
                original_id: task.original_id.clone(),
            };

            match self.handler.handle(invocation).await {
                Ok(()) => {
                    outcome.succeeded += 1;
                    if let TaskKind::Every { interval_ms } = task.kind {
                        // Recurrence is measured from the moment of this
                        // success, with the retry bookkeeping reset.
                        let next_due = self.clock.now_ms() + interval_ms as i64;
                        self.registry.requeue(next_due, &task, 0, None).await?;
                        debug!(original_id = %task.original_id, next_due, "recurring task requeued");
                    } else {
                        self.registry.delete_alias(&task.original_id).await?;
                        debug!(original_id = %task.original_id, "one-shot task completed");
                    }
                }
                Err(err) => {
                    outcome.failed += 1;
                    let retry_due =
                        self.clock.now_ms() + self.config.retry_interval_ms as i64;
                    warn!(task_id = %task.id, original_id = %task.original_id, attempt,
                        error = %err, retry_due, "handler failed; retry scheduled");
                    self.registry
                        .requeue(retry_due, &task, attempt, Some(err.to_string()))
                        .await?;
                }
            }

            // The processed instance always goes away; a requeue above wrote
            // a separate record under a fresh id.
            self.registry.delete_record(&task.id).await?;
        }

        self.registry.recompute_wake().await?;
        Ok(outcome)
    }
}
