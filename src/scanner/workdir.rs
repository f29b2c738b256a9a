//! Working directory detection - var files, provider, backend, init status

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// `backend "<name>"` inside a `terraform { }` block
static BACKEND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bbackend\s+"([A-Za-z0-9_-]+)""#).expect("regex for backend blocks")
});

/// Backend reported when no backend block is declared
pub const LOCAL_BACKEND: &str = "local";

/// Cloud provider detected from the configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Azure,
    Gcp,
    Aws,
}

impl Provider {
    /// Provider referenced by one `.tf` file. Checked in a fixed order, so a
    /// file mentioning both `azurerm` and `aws` counts as Azure.
    pub fn detect(content: &str) -> Option<Self> {
        if content.contains("azurerm") {
            Some(Self::Azure)
        } else if content.contains("google") {
            Some(Self::Gcp)
        } else if content.contains("aws") {
            Some(Self::Aws)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Aws => "aws",
        }
    }

    /// Environment variable naming the active account/subscription/project
    pub fn account_env(&self) -> &'static str {
        match self {
            Self::Azure => "ARM_SUBSCRIPTION_ID",
            Self::Gcp => "GOOGLE_PROJECT",
            Self::Aws => "AWS_PROFILE",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What tfc knows about a working directory without running anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdirInfo {
    pub workdir: PathBuf,
    /// First `*.tfvars` file by name
    pub var_file: Option<String>,
    pub provider: Option<Provider>,
    /// Account from the provider's environment variable
    pub account: Option<String>,
    pub state_backend: String,
    /// `.terraform` exists
    pub initialized: bool,
}

impl WorkdirInfo {
    /// Scan `dir` (not recursively), reading accounts from the environment
    pub fn detect(dir: &Path) -> Result<Self> {
        Self::detect_with_env(dir, |key| std::env::var(key).ok())
    }

    /// Scan `dir`, looking up environment variables through `env`
    pub fn detect_with_env(dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut var_file = None;
        let mut provider = None;
        let mut backend = None;

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("Could not scan {}", dir.display()))?;
            let path = entry.path();
            // Follows symlinks, so linked shared files count too.
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();

            if file_name.ends_with(".tfvars") {
                if var_file.is_none() {
                    var_file = Some(file_name.to_string());
                }
            } else if file_name.ends_with(".tf") {
                let content = match fs::read_to_string(path) {
                    Ok(content) => content,
                    Err(e) => {
                        log::warn!("Skipping {}: {e}", path.display());
                        continue;
                    }
                };
                if let Some(found) = Provider::detect(&content) {
                    provider = Some(found);
                }
                if backend.is_none() {
                    backend = BACKEND_RE
                        .captures(&content)
                        .map(|caps| caps[1].to_string());
                }
            }
        }

        let account = provider
            .and_then(|p| env(p.account_env()))
            .filter(|value| !value.is_empty());

        Ok(Self {
            workdir: dir.to_path_buf(),
            var_file,
            provider,
            account,
            state_backend: backend.unwrap_or_else(|| LOCAL_BACKEND.to_string()),
            initialized: dir.join(".terraform").exists(),
        })
    }

    /// Last path component of the working directory
    pub fn name(&self) -> String {
        self.workdir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.workdir.display().to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_empty_dir() {
        let dir = TempDir::new().unwrap();
        let info = WorkdirInfo::detect_with_env(dir.path(), no_env).unwrap();

        assert_eq!(info.var_file, None);
        assert_eq!(info.provider, None);
        assert_eq!(info.state_backend, "local");
        assert!(!info.initialized);
    }

    #[test]
    fn test_first_tfvars_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("prod.tfvars"), "").unwrap();
        fs::write(dir.path().join("dev.tfvars"), "").unwrap();

        let info = WorkdirInfo::detect_with_env(dir.path(), no_env).unwrap();
        assert_eq!(info.var_file.as_deref(), Some("dev.tfvars"));
    }

    #[test]
    fn test_tfvars_in_subdirectory_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("envs")).unwrap();
        fs::write(dir.path().join("envs").join("dev.tfvars"), "").unwrap();

        let info = WorkdirInfo::detect_with_env(dir.path(), no_env).unwrap();
        assert_eq!(info.var_file, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_scanned() {
        use std::os::unix::fs::symlink;

        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("common.tfvars"), "").unwrap();
        fs::write(shared.path().join("providers.tf"), r#"provider "google" {}"#).unwrap();

        let dir = TempDir::new().unwrap();
        symlink(shared.path().join("common.tfvars"), dir.path().join("common.tfvars")).unwrap();
        symlink(shared.path().join("providers.tf"), dir.path().join("providers.tf")).unwrap();
        fs::create_dir(dir.path().join("modules.tf")).unwrap();

        let info = WorkdirInfo::detect_with_env(dir.path(), no_env).unwrap();
        assert_eq!(info.var_file.as_deref(), Some("common.tfvars"));
        assert_eq!(info.provider, Some(Provider::Gcp));
    }

    #[test]
    fn test_provider_last_file_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.tf"),
            r#"provider "azurerm" { features {} }"#,
        )
        .unwrap();
        fs::write(dir.path().join("b.tf"), r#"provider "aws" {}"#).unwrap();
        fs::write(dir.path().join("c.tf"), "variable \"x\" {}").unwrap();

        let info = WorkdirInfo::detect_with_env(dir.path(), no_env).unwrap();
        assert_eq!(info.provider, Some(Provider::Aws));
    }

    #[test]
    fn test_provider_priority_within_file() {
        assert_eq!(
            Provider::detect("aws then azurerm"),
            Some(Provider::Azure)
        );
        assert_eq!(Provider::detect("google_compute_instance"), Some(Provider::Gcp));
        assert_eq!(Provider::detect("resource \"null_resource\" \"x\" {}"), None);
    }

    #[test]
    fn test_account_from_env() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tf"), r#"provider "google" {}"#).unwrap();

        let info = WorkdirInfo::detect_with_env(dir.path(), |key| {
            (key == "GOOGLE_PROJECT").then(|| "my-project".to_string())
        })
        .unwrap();
        assert_eq!(info.provider, Some(Provider::Gcp));
        assert_eq!(info.account.as_deref(), Some("my-project"));
    }

    #[test]
    fn test_backend_and_init() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("backend.tf"),
            "terraform {\n  backend \"azurerm\" {\n    key = \"x\"\n  }\n}\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join(".terraform")).unwrap();

        let info = WorkdirInfo::detect_with_env(dir.path(), no_env).unwrap();
        assert_eq!(info.state_backend, "azurerm");
        assert!(info.initialized);
    }
}
