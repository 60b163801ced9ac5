//! Configuration loading and root folder resolution

use crate::kpi::KpiPolicy;
use crate::smoothing::DEFAULT_SMOOTHING_ALPHA;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "NEUROLINK_ROOT_FOLDER";

/// Configuration file name looked up inside the root folder
pub const CONFIG_FILE_NAME: &str = "neurolink.toml";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "neurolink.db";

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("neurolink"))
        .unwrap_or_else(|| PathBuf::from("./neurolink_data"))
}

/// Broadcast loop timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcastConfig {
    /// Period of the shared tick
    pub tick_period_ms: u64,
    /// Minimum spacing of persisted samples per session
    pub persist_interval_ms: u64,
    /// Per-connection outbound snapshot queue depth
    pub outbound_queue: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1000,
            persist_interval_ms: 1000,
            outbound_queue: 8,
        }
    }
}

impl BroadcastConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }
}

/// Incoming frame limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Frames classified concurrently per connection; extra frames are dropped
    pub max_inflight_per_connection: usize,
    /// Largest accepted encoded frame payload in bytes
    pub max_frame_bytes: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_inflight_per_connection: 1,
            max_frame_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmoothingConfig {
    pub alpha: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { alpha: DEFAULT_SMOOTHING_ALPHA }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KpiConfig {
    /// Upper bound of the random term added to engagement and trust
    pub jitter_max: f64,
    /// Fixed seed for the noise source (reproducible runs)
    pub seed: Option<u64>,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            jitter_max: KpiPolicy::default().jitter_max,
            seed: None,
        }
    }
}

impl KpiConfig {
    pub fn policy(&self) -> KpiPolicy {
        KpiPolicy::default().with_jitter_max(self.jitter_max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Base URL of a DeepFace-compatible analysis service
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { url: None, timeout_ms: 5000 }
    }
}

/// Service configuration (TOML file contents)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub broadcast: BroadcastConfig,
    pub frames: FrameConfig,
    pub smoothing: SmoothingConfig,
    pub kpi: KpiConfig,
    pub classifier: ClassifierConfig,
}

impl ServiceConfig {
    /// Parse TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.broadcast.tick_period_ms == 0 {
            return Err(Error::Config("broadcast.tick_period_ms must be > 0".to_string()));
        }
        if self.broadcast.outbound_queue == 0 {
            return Err(Error::Config("broadcast.outbound_queue must be > 0".to_string()));
        }
        if self.frames.max_inflight_per_connection == 0 {
            return Err(Error::Config(
                "frames.max_inflight_per_connection must be > 0".to_string(),
            ));
        }
        if self.frames.max_frame_bytes == 0 {
            return Err(Error::Config("frames.max_frame_bytes must be > 0".to_string()));
        }
        let alpha = self.smoothing.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::Config(format!(
                "smoothing.alpha must lie in (0, 1], got {}",
                alpha
            )));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(Error::Config("classifier.timeout_ms must be > 0".to_string()));
        }
        self.kpi.policy().validate()
    }
}
