use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::AccelError;

const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationConfig {
    pub cache_enabled: bool,
    // cadence for whoever drives refresh; the cache never schedules itself
    pub refresh_interval_ms: u64,
    pub candidate_prefilter: bool,
}

impl Default for AccelerationConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            candidate_prefilter: true,
        }
    }
}

impl AccelerationConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, AccelError> {
        serde_json::from_str(raw)
            .map_err(|err| AccelError::invalid_config(format!("acceleration config: {err}")))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}
