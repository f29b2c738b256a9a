//! Option types for the workflow commands.

use serde::{Deserialize, Serialize};

/// Default program name.
pub const DEFAULT_BINARY: &str = "terraform";

/// Default saved-plan file, relative to the working directory.
pub const DEFAULT_PLAN_FILE: &str = "tfplan.out";

/// Default local state file, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "terraform.tfstate";

/// Options for `plan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Variable files passed as `-var-file <path>`, in order
    #[serde(default)]
    pub var_files: Vec<String>,
}

impl PlanOptions {
    /// Create empty plan options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable file.
    pub fn with_var_file(mut self, path: impl Into<String>) -> Self {
        self.var_files.push(path.into());
        self
    }
}
