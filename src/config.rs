//! Engine Configuration
//!
//! Loaded from YAML. Every field has a default, so an empty or missing
//! file yields a working configuration.
//!
//! # Example
//!
//! ```yaml
//! activity_resolution: strict
//! progress_max_depth: 8
//! state_dir: /var/lib/flowrunner
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::{DEFAULT_MAX_DEPTH, MIN_PROGRESS_DEPTH};

const CONFIG_FILE: &str = "flowrunner.yaml";

/// Lazily-resolved default configuration path.
pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    // Priority 1: Explicit override
    if let Ok(path) = std::env::var("FLOWRUNNER_CONFIG") {
        info!("Using config from FLOWRUNNER_CONFIG: {}", path);
        return PathBuf::from(path);
    }

    // Priority 2: Next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let exe_config = exe_dir.join(CONFIG_FILE);
            if exe_config.exists() {
                info!("Using config next to executable: {}", exe_config.display());
                return exe_config;
            }
        }
    }

    // Priority 3: Current working directory
    PathBuf::from(CONFIG_FILE)
});

/// How flow documents treat activity names that cannot be resolved.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Drop the hook and log a warning
    #[default]
    Lenient,

    /// Fail the build
    Strict,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub activity_resolution: ResolutionPolicy,

    /// Nesting bound for persisted progress documents
    pub progress_max_depth: usize,

    /// Directory for file-backed execution records; in-memory when absent
    pub state_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            activity_resolution: ResolutionPolicy::Lenient,
            progress_max_depth: DEFAULT_MAX_DEPTH,
            state_dir: None,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Parses and validates YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads [`CONFIG_PATH`], or defaults when the file does not exist.
    pub fn discover() -> Result<Self, ConfigError> {
        let path = &*CONFIG_PATH;
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.progress_max_depth < MIN_PROGRESS_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "progress_max_depth must be at least {} (got {})",
                MIN_PROGRESS_DEPTH, self.progress_max_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.activity_resolution, ResolutionPolicy::Lenient);
        assert_eq!(config.progress_max_depth, 7);
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let config = EngineConfig::from_yaml("activity_resolution: strict\n").unwrap();
        assert_eq!(config.activity_resolution, ResolutionPolicy::Strict);
        assert_eq!(config.progress_max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(EngineConfig::from_yaml("  \n").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_depth_too_small() {
        let result = EngineConfig::from_yaml("progress_max_depth: 3\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_policy() {
        let result = EngineConfig::from_yaml("activity_resolution: sloppy\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("flowrunner.yaml");
        fs::write(&path, "progress_max_depth: 9\nstate_dir: /tmp/flows\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.progress_max_depth, 9);
        assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/flows")));
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/nonexistent/flowrunner.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
