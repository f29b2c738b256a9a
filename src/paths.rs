//! Centralized path resolution for tfc
//!
//! # Environment Variables
//!
//! - `TFC_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/tfc`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `TFC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/tfcompanion` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\tfcompanion`
//!    - macOS/Linux: `~/.config/tfcompanion`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "TFC_CONFIG_DIR";

/// Directory name under the platform config root
const APP_DIR: &str = "tfcompanion";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the tfc config directory path
pub fn config_dir() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    // 2. Check XDG_CONFIG_HOME
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the path of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Resolve the working directory given on the command line.
///
/// The directory must already exist; it is never created.
pub fn resolve_workdir(dir: &Path) -> Result<PathBuf> {
    let expanded = expand(&dir.to_string_lossy());
    let resolved = expanded
        .canonicalize()
        .with_context(|| format!("Directory {} does not exist", expanded.display()))?;
    if !resolved.is_dir() {
        anyhow::bail!("{} is not a directory", resolved.display());
    }
    Ok(resolved)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that touch the process environment.
    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with `key` set to `value` (or removed for `None`), restoring
    /// the previous value afterwards.
    fn with_env<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: callers hold env_lock(), so no other test thread touches the
        // environment while it is modified.
        unsafe {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let result = f();
        // SAFETY: as above
        unsafe {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        let _guard = env_lock();
        with_env(ENV_CONFIG_DIR, Some("/custom/config/path"), || {
            let result = config_dir().unwrap();
            assert_eq!(result, PathBuf::from("/custom/config/path"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/config/path/config.toml")
            );
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let _guard = env_lock();
        let home = dirs::home_dir().unwrap();
        let expected = home.join("dotfiles").join("tfc-tilde-test");
        with_env(ENV_CONFIG_DIR, Some("~/dotfiles/tfc-tilde-test"), || {
            assert_eq!(config_dir().unwrap(), expected);
        });
    }

    #[test]
    fn test_xdg_config_home() {
        let _guard = env_lock();
        with_env(ENV_CONFIG_DIR, None, || {
            with_env("XDG_CONFIG_HOME", Some("/tmp/xdg-config-test"), || {
                let result = config_dir().unwrap();
                assert_eq!(result, PathBuf::from("/tmp/xdg-config-test/tfcompanion"));
            });
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_default_config_dir_unix() {
        let _guard = env_lock();
        with_env(ENV_CONFIG_DIR, None, || {
            with_env("XDG_CONFIG_HOME", None, || {
                let home = dirs::home_dir().unwrap();
                assert_eq!(
                    config_dir().unwrap(),
                    home.join(".config").join("tfcompanion")
                );
            });
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_TFC_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_TFC_VAR_12345/file"));
    }

    #[test]
    fn test_resolve_workdir() {
        let dir = tempfile::TempDir::new().unwrap();
        let resolved = resolve_workdir(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());

        let file = dir.path().join("main.tf");
        std::fs::write(&file, "").unwrap();
        assert!(resolve_workdir(&file).is_err());
        assert!(resolve_workdir(&dir.path().join("missing")).is_err());
    }
}
