use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::pipeline::{LoopTiming, SessionOptions, SyncConfig};

/// Engine settings, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sync: SyncConfig,
    /// Relative seek of the arrow keys, in seconds
    pub seek_step_secs: f64,
    pub tick_interval_ms: u64,
    pub stats_interval_secs: u64,
    pub auto_play: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sync: SyncConfig::default(),
            seek_step_secs: 5.0,
            tick_interval_ms: 16,
            stats_interval_secs: 30,
            auto_play: true,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let sync = &self.sync;
        if !(sync.soft_threshold > 0.0 && sync.soft_threshold < sync.hard_threshold) {
            anyhow::bail!(
                "Soft threshold {} must be positive and below the hard threshold {}",
                sync.soft_threshold,
                sync.hard_threshold
            );
        }
        if !(sync.rate_adjust > 0.0 && sync.rate_adjust < 0.5) {
            anyhow::bail!("Rate adjustment {} must be within (0, 0.5)", sync.rate_adjust);
        }
        if !(self.seek_step_secs.is_finite() && self.seek_step_secs > 0.0) {
            anyhow::bail!("Seek step must be positive");
        }
        if self.tick_interval_ms == 0 || self.stats_interval_secs == 0 {
            anyhow::bail!("Loop intervals cannot be 0");
        }
        Ok(())
    }

    pub fn timing(&self) -> LoopTiming {
        LoopTiming {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            stats_interval: Duration::from_secs(self.stats_interval_secs),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            auto_play: self.auto_play,
            sync: self.sync,
            ..Default::default()
        }
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
