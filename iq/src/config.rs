//! idlequeue configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::EngineConfig;
use crate::monitor::MonitorConfig;
use crate::scheduler::SchedulerConfig;

/// Named sets of defaults
///
/// Explicit settings in a config file override whatever the profile picks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Frame-paced label timers on a fixed 17ms poll, 100ms debounce
    #[default]
    Browser,
    /// Plain timers: 50ms tick with no jitter allowance, 1s window, labels queue by default
    Timer,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browser => write!(f, "browser"),
            Self::Timer => write!(f, "timer"),
        }
    }
}

/// Main idlequeue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Profile the remaining defaults are taken from
    pub profile: Profile,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Idle detection
    pub monitor: MonitorConfig,

    /// Label queues
    pub scheduler: SchedulerConfig,

    /// Composition of the two
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_profile(Profile::Browser)
    }
}

impl Config {
    /// Defaults for a profile
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Browser => Self {
                profile,
                log_level: None,
                monitor: MonitorConfig::default(),
                scheduler: SchedulerConfig::default(),
                engine: EngineConfig::default(),
            },
            Profile::Timer => Self {
                profile,
                log_level: None,
                monitor: MonitorConfig {
                    tick_ms: 50,
                    idle_threshold: 100,
                    fuzziness_ms: 0,
                },
                scheduler: SchedulerConfig {
                    default_interval_ms: 1000,
                    default_queue: true,
                    ..Default::default()
                },
                engine: EngineConfig {
                    frame_period_ms: None,
                    ..Default::default()
                },
            },
        }
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.monitor.tick_ms == 0 {
            return Err(eyre::eyre!("monitor.tick-ms must be greater than zero"));
        }
        if self.monitor.idle_threshold == 0 {
            return Err(eyre::eyre!("monitor.idle-threshold must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .idlequeue.yml
        let local_config = PathBuf::from(".idlequeue.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/idlequeue/idlequeue.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("idlequeue").join("idlequeue.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => {
                let local = PathBuf::from(".idlequeue.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir()?.join("idlequeue").join("idlequeue.yml")
                }
            }
        };
        let content = fs::read_to_string(path).ok()?;
        let value: Value = serde_yaml::from_str(&content).ok()?;
        value.get("log-level")?.as_str().map(str::to_string)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse YAML, filling unset keys from the selected profile
    pub fn from_yaml(content: &str) -> Result<Self> {
        let overlay: Value = serde_yaml::from_str(content).context("Failed to parse config file")?;
        let profile = match overlay.get("profile") {
            Some(value) => serde_yaml::from_value(value.clone()).context("Invalid profile")?,
            None => Profile::default(),
        };

        let mut merged = serde_yaml::to_value(Self::for_profile(profile)).context("Failed to encode defaults")?;
        merge_yaml(&mut merged, overlay);

        let config: Self = serde_yaml::from_value(merged).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml()?).context(format!("Failed to write config to {}", path.display()))
    }
}

/// Recursively overlay mapping keys; anything else replaces the base value
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}
