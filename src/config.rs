//! Process-wide defaults for batch operations
//!
//! Batch operations take an explicit [`CopyOptions`]; its `Default` reads the
//! process-wide [`EnlaceConfig`], which can be loaded from YAML:
//!
//! ```yaml
//! use_gpu: false
//! device: -1
//! stream: default
//! ```

use crate::device::{DeviceGuard, DeviceId, Stream};
use crate::error::{EnlaceError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Default device placement and stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnlaceConfig {
    /// Allocate destination buffers on the active device instead of the host
    pub use_gpu: bool,
    /// Device made active by [`EnlaceConfig::enter_device`]
    pub device: DeviceId,
    /// Stream copies are issued on
    pub stream: Stream,
}

impl EnlaceConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| EnlaceError::Config { message: format!("Failed to parse YAML config: {e}") })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .map_err(|e| EnlaceError::io(format!("reading config {}", path.display()), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Make the configured device active on this thread until the guard drops.
    pub fn enter_device(&self) -> DeviceGuard {
        DeviceGuard::switch(self.device)
    }

    /// Reject placements that cannot be honoured.
    pub fn validate(&self) -> Result<()> {
        if self.device.0 < -1 {
            return Err(EnlaceError::Config {
                message: format!("device must be -1 (host) or a device index, got {}", self.device.0),
            });
        }
        if self.use_gpu && self.device.is_host() {
            return Err(EnlaceError::Config {
                message: "use_gpu is set but device is the host (-1)".to_string(),
            });
        }
        Ok(())
    }
}

fn global() -> &'static RwLock<EnlaceConfig> {
    static DEFAULTS: OnceLock<RwLock<EnlaceConfig>> = OnceLock::new();
    DEFAULTS.get_or_init(|| RwLock::new(EnlaceConfig::default()))
}

/// Current process-wide defaults.
pub fn defaults() -> EnlaceConfig {
    *global().read().unwrap_or_else(PoisonError::into_inner)
}

/// Replace the process-wide defaults.
pub fn set_defaults(config: EnlaceConfig) -> Result<()> {
    config.validate()?;
    *global().write().unwrap_or_else(PoisonError::into_inner) = config;
    tracing::debug!(?config, "enlace defaults updated");
    Ok(())
}

/// Placement and stream for one batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    pub use_gpu: bool,
    pub stream: Stream,
}

impl CopyOptions {
    pub fn new(use_gpu: bool, stream: Stream) -> Self {
        Self { use_gpu, stream }
    }

    /// Host placement on the default stream, ignoring process-wide defaults.
    pub fn host() -> Self {
        Self { use_gpu: false, stream: Stream::Default }
    }
}

impl Default for CopyOptions {
    fn default() -> Self {
        let config = defaults();
        Self { use_gpu: config.use_gpu, stream: config.stream }
    }
}
