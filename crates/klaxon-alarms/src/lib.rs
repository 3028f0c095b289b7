//! `klaxon-alarms` — durable alarm scheduler over a single host wake slot.
//!
//! # Overview
//!
//! Many independently scheduled logical tasks are multiplexed onto the one
//! wake primitive a host provides. Task records live in an ordered
//! key-value store ([`klaxon_store::DurableStore`]) under sortable,
//! time-encoded ids, so every piece of state — including retry bookkeeping
//! and the armed wake time — survives a process restart. When the host
//! fires the wake callback, [`AlarmManager::on_wake`] runs everything due
//! in due-time order and re-arms the register.
//!
//! # Schedule kinds
//!
//! | Kind    | Behaviour                                                  |
//! |---------|------------------------------------------------------------|
//! | `At`    | Single fire at an absolute unix-ms instant                 |
//! | `In`    | Single fire N ms after scheduling                          |
//! | `Every` | Repeats; each interval measured from the last success      |
//!
//! Failed handler invocations retry at a fixed interval (default 60 s,
//! see [`AlarmConfig`]) with `attempt`/`previous_error` carried on the
//! record. Delivery is at-least-once; handlers own idempotency.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod manager;
pub mod parser;
pub mod registry;
pub mod types;

pub use clock::{ManualClock, TimeSource, WallClock};
pub use config::{AlarmConfig, DEFAULT_RETRY_INTERVAL_MS};
pub use dispatch::WakeOutcome;
pub use error::{AlarmError, Result};
pub use manager::{AlarmHandler, AlarmManager};
pub use parser::{PayloadParser, SerdeParser};
pub use registry::TaskRegistry;
pub use types::{Invocation, PendingAlarm, TaskKind, TaskRecord};
