//! Editing engine configuration

use crate::{EditError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound for the merge window (one hour)
const MAX_MERGE_WINDOW_MS: u64 = 3_600_000;

/// Tunables for the editing engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of history entries kept before the oldest are dropped
    pub max_history: usize,
    /// Commands of one gesture closer together than this are merged
    pub merge_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history: 500,
            merge_window_ms: 500,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(|e| EditError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            return Err(EditError::Config("max_history must be at least 1".to_string()));
        }
        if self.merge_window_ms > MAX_MERGE_WINDOW_MS {
            return Err(EditError::Config(format!(
                "merge_window_ms must not exceed {}",
                MAX_MERGE_WINDOW_MS
            )));
        }
        Ok(())
    }

    pub fn merge_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.merge_window_ms.min(MAX_MERGE_WINDOW_MS) as i64)
    }
}
