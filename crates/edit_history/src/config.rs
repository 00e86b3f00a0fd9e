use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Edits closer together than this become one undo unit.
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,

    /// Oldest undo units are dropped past this depth.
    #[serde(default = "default_max_undo_depth")]
    pub max_undo_depth: usize,
}

fn default_coalesce_window_ms() -> u64 {
    750
}

fn default_max_undo_depth() -> usize {
    1000
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: default_coalesce_window_ms(),
            max_undo_depth: default_max_undo_depth(),
        }
    }
}

impl HistoryConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn validate(&self) -> HistoryResult<()> {
        if self.max_undo_depth == 0 {
            return Err(HistoryError::Config(
                "max_undo_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> HistoryResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: HistoryConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}
