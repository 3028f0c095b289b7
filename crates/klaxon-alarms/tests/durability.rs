// Retry bookkeeping, failure containment, idempotent cancellation, and
// restart survival over the SQLite backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use klaxon_alarms::{
    AlarmConfig, AlarmHandler, AlarmManager, Invocation, ManualClock, SerdeParser, TimeSource,
    DEFAULT_RETRY_INTERVAL_MS,
};
use klaxon_store::{DurableStore, MemoryStore, SqliteStore};

const START: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Ping {
    url: String,
}

/// Fails the first `fail_first` attempts of every task, then succeeds.
/// Records `(url, attempt, previous_error)` for each invocation.
#[derive(Clone)]
struct Flaky {
    fail_first: u32,
    seen: Arc<Mutex<Vec<(String, u32, Option<String>)>>>,
}

impl Flaky {
    fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<(String, u32, Option<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlarmHandler<Ping> for Flaky {
    async fn handle(&self, invocation: Invocation<Ping>) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push((
            invocation.payload.url.clone(),
            invocation.attempt,
            invocation.previous_error.clone(),
        ));
        if invocation.attempt <= self.fail_first {
            anyhow::bail!("boom {}", invocation.attempt);
        }
        Ok(())
    }
}

fn manager<S: DurableStore + 'static>(
    store: Arc<S>,
    clock: Arc<ManualClock>,
    handler: Flaky,
    config: AlarmConfig,
) -> AlarmManager<SerdeParser<Ping>, Flaky> {
    AlarmManager::new(store, SerdeParser::new(), handler, config, clock)
}

#[tokio::test]
async fn failed_one_shot_retries_with_increasing_attempts() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let flaky = Flaky::new(2);
    let manager = manager(
        store.clone(),
        clock.clone(),
        flaky.clone(),
        AlarmConfig::default(),
    );

    let task_id = manager.schedule_in(1_000, json!({"url": "job"})).await.unwrap();

    clock.advance(1_000);
    let outcome = manager.on_wake().await.unwrap();
    assert_eq!((outcome.ran, outcome.failed), (1, 1));

    // The retry sits one fixed interval out, under a new id but the same
    // logical identity, with the failure recorded.
    let retry = manager.next_alarm().await.unwrap().unwrap();
    assert_eq!(
        retry.due_ms,
        clock.now_ms() + DEFAULT_RETRY_INTERVAL_MS as i64
    );
    assert_ne!(retry.task.id, task_id);
    assert_eq!(retry.task.original_id, task_id);
    assert_eq!(retry.task.attempt, 1);
    assert_eq!(retry.task.previous_error.as_deref(), Some("boom 1"));

    // Not due until the full interval has elapsed.
    clock.advance(30_000);
    assert!(manager.on_wake().await.unwrap().nothing_ran());

    clock.advance(30_000);
    assert_eq!(manager.on_wake().await.unwrap().failed, 1);

    clock.advance(DEFAULT_RETRY_INTERVAL_MS as i64);
    assert_eq!(manager.on_wake().await.unwrap().succeeded, 1);

    // Attempts 1, 2, 3 with previous_error trailing by one.
    let seen = flaky.seen();
    let attempts: Vec<_> = seen.iter().map(|(_, a, _)| *a).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(seen[0].2, None);
    assert_eq!(seen[1].2.as_deref(), Some("boom 1"));
    assert_eq!(seen[2].2.as_deref(), Some("boom 2"));

    // Completed one-shot: gone for good.
    assert!(manager.next_alarm().await.unwrap().is_none());
    assert_eq!(store.get_wake().await.unwrap(), None);
    assert!(!manager.cancel(&task_id).await.unwrap());

    clock.advance(DEFAULT_RETRY_INTERVAL_MS as i64);
    assert!(manager.on_wake().await.unwrap().nothing_ran());
    assert_eq!(flaky.seen().len(), 3);
}

#[tokio::test]
async fn retry_interval_is_configurable() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let flaky = Flaky::new(1);
    let config = AlarmConfig {
        retry_interval_ms: 5_000,
    };
    let manager = manager(store, clock.clone(), flaky.clone(), config);

    manager.schedule_in(1_000, json!({"url": "job"})).await.unwrap();

    clock.advance(1_000);
    assert_eq!(manager.on_wake().await.unwrap().failed, 1);

    clock.advance(5_000);
    assert_eq!(manager.on_wake().await.unwrap().succeeded, 1);
    assert_eq!(flaky.seen().len(), 2);
}

#[tokio::test]
async fn handler_failure_does_not_abort_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    // Every first attempt fails, so the early task cannot block the later one.
    let flaky = Flaky::new(1);
    let manager = manager(
        store,
        clock.clone(),
        flaky.clone(),
        AlarmConfig::default(),
    );

    manager.schedule_in(1_000, json!({"url": "first"})).await.unwrap();
    manager.schedule_in(1_001, json!({"url": "second"})).await.unwrap();

    clock.advance(1_001);
    let outcome = manager.on_wake().await.unwrap();
    assert_eq!((outcome.ran, outcome.failed), (2, 2));

    let urls: Vec<_> = flaky.seen().iter().map(|(u, _, _)| u.clone()).collect();
    assert_eq!(urls, vec!["first", "second"]);
}

#[tokio::test]
async fn cancelling_a_retrying_task_stops_the_cycle() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let flaky = Flaky::new(u32::MAX); // never succeeds
    let manager = manager(
        store.clone(),
        clock.clone(),
        flaky.clone(),
        AlarmConfig::default(),
    );

    let task_id = manager.schedule_in(1_000, json!({"url": "doomed"})).await.unwrap();

    clock.advance(1_000);
    assert_eq!(manager.on_wake().await.unwrap().failed, 1);

    // The alias follows the requeued record, so the original id still cancels.
    assert!(manager.cancel(&task_id).await.unwrap());
    assert!(!manager.cancel(&task_id).await.unwrap());
    assert!(store.is_empty());

    clock.advance(DEFAULT_RETRY_INTERVAL_MS as i64);
    assert!(manager.on_wake().await.unwrap().nothing_ran());
    assert_eq!(flaky.seen().len(), 1);
}

#[tokio::test]
async fn pending_state_survives_a_scheduler_restart() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(START));

    // First scheduler instance writes and is dropped.
    {
        let first = manager(
            store.clone(),
            clock.clone(),
            Flaky::new(0),
            AlarmConfig::default(),
        );
        first.schedule_in(10_000, json!({"url": "persisted"})).await.unwrap();
        first
            .schedule_every(30_000, json!({"url": "heartbeat"}))
            .await
            .unwrap();
    }

    // A fresh instance over the same store sees identical pending state.
    let flaky = Flaky::new(0);
    let revived = manager(
        store.clone(),
        clock.clone(),
        flaky.clone(),
        AlarmConfig::default(),
    );

    let next = revived.next_alarm().await.unwrap().unwrap();
    assert_eq!(next.due_ms, START + 10_000);
    assert_eq!(store.get_wake().await.unwrap(), Some(START + 10_000));

    clock.advance(10_000);
    assert_eq!(revived.on_wake().await.unwrap().succeeded, 1);
    let urls: Vec<_> = flaky.seen().iter().map(|(u, _, _)| u.clone()).collect();
    assert_eq!(urls, vec!["persisted"]);

    // The recurring task is still on cadence after the handoff.
    clock.advance(20_000);
    assert_eq!(revived.on_wake().await.unwrap().succeeded, 1);
    let urls: Vec<_> = flaky.seen().iter().map(|(u, _, _)| u.clone()).collect();
    assert_eq!(urls, vec!["persisted", "heartbeat"]);
}
