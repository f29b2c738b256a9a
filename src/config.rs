//! `config.toml` schema and loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tfkit::{DEFAULT_BINARY, DEFAULT_PLAN_FILE, DEFAULT_STATE_FILE};

use crate::paths;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The tfc configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Which binary to run and where its files live
    #[serde(default)]
    pub terraform: TerraformConfig,

    /// Process supervision settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformConfig {
    /// Program to run (name on PATH or a path)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Saved plan file, relative to the working directory
    #[serde(default = "default_plan_file")]
    pub plan_file: String,

    /// State file, relative to the working directory
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            plan_file: default_plan_file(),
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Milliseconds between SIGTERM and SIGKILL when a run is cancelled
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Cancel runs after this many seconds (0 disables the watchdog)
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            timeout_secs: 0,
        }
    }
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_plan_file() -> String {
    DEFAULT_PLAN_FILE.to_string()
}

fn default_state_file() -> String {
    DEFAULT_STATE_FILE.to_string()
}

fn default_grace_period_ms() -> u64 {
    tfkit::process::DEFAULT_GRACE_PERIOD.as_millis() as u64
}

impl Config {
    /// Load the config from the config directory, or defaults if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load the config from a specific file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Write the config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(path.to_path_buf())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.runner.grace_period_ms)
    }

    /// Watchdog timeout, if enabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.runner.timeout_secs > 0).then(|| Duration::from_secs(self.runner.timeout_secs))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.terraform.binary, "terraform");
        assert_eq!(config.terraform.plan_file, "tfplan.out");
        assert_eq!(config.grace_period(), Duration::from_secs(2));
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[terraform]
binary = "tofu"

[runner]
timeout_secs = 900
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.terraform.binary, "tofu");
        assert_eq!(config.terraform.state_file, "terraform.tfstate");
        assert_eq!(config.runner.grace_period_ms, 2000);
        assert_eq!(config.timeout(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[terraform\nbinary = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid TOML"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.runner.grace_period_ms = 500;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
