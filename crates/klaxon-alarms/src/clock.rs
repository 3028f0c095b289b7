use std::sync::atomic::{AtomicI64, Ordering};

/// Time source abstraction so schedulers can run on wall-clock time in
/// production and scripted time in tests. Injected, never ambient.
pub trait TimeSource: Send + Sync {
    /// Current unix time in milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall-clock time source for production use.
#[derive(Debug, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven time source. Time only moves when told to, which makes
/// due-time and recurrence behavior deterministic under test.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Move time forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
