//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Knobs for a [`crate::Runtime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Threads in the async effect pool. 0 lets rayon decide.
    pub async_workers: usize,
    /// Nested function calls deeper than this return nothing.
    pub max_call_depth: usize,
    /// When false, a call whose parameter is bound to nothing is skipped.
    pub execute_functions_with_missing_params: bool,
    /// Log when a delay shorter than one tick is rounded up.
    pub warn_sub_tick_delays: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            async_workers: 0,
            max_call_depth: 256,
            execute_functions_with_missing_params: true,
            warn_sub_tick_delays: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overridden by `SKRIPT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            async_workers: env_or("SKRIPT_ASYNC_WORKERS", defaults.async_workers),
            max_call_depth: env_or("SKRIPT_MAX_CALL_DEPTH", defaults.max_call_depth),
            execute_functions_with_missing_params: env_or(
                "SKRIPT_EXECUTE_FUNCTIONS_WITH_MISSING_PARAMS",
                defaults.execute_functions_with_missing_params,
            ),
            warn_sub_tick_delays: env_or(
                "SKRIPT_WARN_SUB_TICK_DELAYS",
                defaults.warn_sub_tick_delays,
            ),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(default)
}
