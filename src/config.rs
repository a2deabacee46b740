//! Configuration for controller sessions
//!
//! Loaded from `<config_dir>/padsession/config.toml`. Every field has a default, so a
//! partial file (or none at all) is valid:
//!
//! ```toml
//! max_controllers = 4
//! sony_features = "dual_sense_features_and_haptics"
//!
//! [haptics]
//! initial_delay_ms = 1000
//! retry_delay_ms = 10000
//! input_layout = "stereo"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::haptics::handshake::HandshakeDelays;
use crate::haptics::resampler::HapticInputLayout;

const CONFIG_DIR_NAME: &str = "padsession";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Which Sony-specific features sessions should negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SonyControllerFeature {
    #[default]
    None,
    /// Touchpad and motion sensors
    DualShockFeatures,
    /// Touchpad, motion sensors and adaptive triggers
    DualSenseFeatures,
    /// Everything above plus audio haptics
    DualSenseFeaturesAndHaptics,
}

impl SonyControllerFeature {
    /// Touchpad and sensor probes run on open.
    pub fn requests_advanced(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn allows_dualsense_effects(&self) -> bool {
        matches!(
            self,
            Self::DualSenseFeatures | Self::DualSenseFeaturesAndHaptics
        )
    }

    pub fn requests_haptics(&self) -> bool {
        matches!(self, Self::DualSenseFeaturesAndHaptics)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticsConfig {
    /// Wait before the first attempt to open the haptic audio output
    pub initial_delay_ms: u64,
    /// Wait before the single retry
    pub retry_delay_ms: u64,
    pub input_layout: HapticInputLayout,
}

impl Default for HapticsConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            retry_delay_ms: 10_000,
            input_layout: HapticInputLayout::Stereo,
        }
    }
}

impl HapticsConfig {
    pub fn delays(&self) -> HandshakeDelays {
        HandshakeDelays {
            initial: Duration::from_millis(self.initial_delay_ms),
            retry: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub max_controllers: u32,
    pub sony_features: SonyControllerFeature,
    pub haptics: HapticsConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_controllers: 4,
            sony_features: SonyControllerFeature::None,
            haptics: HapticsConfig::default(),
        }
    }
}

/// Per-session slice of [`ManagerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub sony_features: SonyControllerFeature,
    pub haptics: HapticsConfig,
}

impl From<&ManagerConfig> for SessionConfig {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            sony_features: config.sony_features,
            haptics: config.haptics,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ManagerConfig {
    /// Default config location, `None` if the platform has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Loads the config from [`default_path`](Self::default_path), falling back to defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("Could not determine config directory, using default config");
            return Self::default();
        };
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}, using default config", e);
                Self::default()
            }
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from(self)
    }
}
