use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};

/// Fixed retry spacing applied after a handler failure.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 60_000;

/// Scheduler tuning knobs (klaxon.toml + KLAXON_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Milliseconds between a failed invocation and its retry. The backoff
    /// is a fixed interval, not exponential.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl AlarmConfig {
    /// Load config from a TOML file with KLAXON_* env var overrides.
    ///
    /// Missing file is fine — defaults apply, env vars still override.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("klaxon.toml");

        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("KLAXON_"))
            .extract()
            .map_err(|e| AlarmError::Config(e.to_string()))
    }
}

fn default_retry_interval() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}
