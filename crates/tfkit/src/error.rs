//! Error types for command execution and document modeling.
//!
//! Errors are categorized so callers can render each failure kind
//! distinctly. Cancellation and an empty state document are not errors:
//! they are reported through [`Termination::Cancelled`] and an empty
//! [`StateModel`] respectively.
//!
//! [`Termination::Cancelled`]: crate::process::Termination::Cancelled
//! [`StateModel`]: crate::state::StateModel

use std::path::PathBuf;
use thiserror::Error;

/// Which document a [`Error::MalformedDocument`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A plan document (`show -json <planfile>` output)
    Plan,
    /// A state document (`terraform.tfstate`)
    State,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::State => write!(f, "state"),
        }
    }
}

/// Categories of failures, used for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The process could not be created
    Spawn,
    /// Reading the child's output failed mid-stream
    Stream,
    /// A plan or state document is structurally invalid
    MalformedDocument,
    /// The external tool ran but reported failure
    Command,
    /// A workflow step was requested before its prerequisite
    Precondition,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Spawn => "Could not start command",
            Self::Stream => "Output stream failed",
            Self::MalformedDocument => "Malformed document",
            Self::Command => "Command failed",
            Self::Precondition => "Step not ready",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Spawn => "Check that the binary is on PATH and the working directory exists",
            Self::Stream => "The command produced unreadable output; lines shown so far are valid",
            Self::MalformedDocument => "Regenerate the plan or state file and try again",
            Self::Command => "Check the command output above for details",
            Self::Precondition => "Run the earlier workflow step first",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors returned by the runner, the builders and the client.
#[derive(Debug, Error)]
pub enum Error {
    /// The program could not be found
    #[error("executable not found: {program}")]
    ExecutableNotFound {
        /// Program name as given in the invocation
        program: String,
    },

    /// The working directory does not exist or is not a directory
    #[error("invalid working directory: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// The stdin redirection source could not be opened
    #[error("cannot open input {}: {source}", path.display())]
    InputUnavailable {
        /// Path of the redirection source
        path: PathBuf,
        /// Underlying open error
        source: std::io::Error,
    },

    /// The OS refused to create the process
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Program name as given in the invocation
        program: String,
        /// Underlying spawn error
        source: std::io::Error,
    },

    /// Reading or decoding the child's output failed
    #[error("output stream of {program} failed: {message}")]
    Stream {
        /// Program whose output failed
        program: String,
        /// Description of the failure
        message: String,
    },

    /// A plan or state document is not structurally valid
    #[error("malformed {kind} document: {message}")]
    MalformedDocument {
        /// Which document failed
        kind: DocumentKind,
        /// Parser message
        message: String,
    },

    /// The tool ran and exited unsuccessfully
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Plan requested before `init`
    #[error("working directory is not initialized: {}", .0.display())]
    NotInitialized(PathBuf),

    /// Apply requested without a saved plan
    #[error("plan file not found: {}", .0.display())]
    PlanFileMissing(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ExecutableNotFound { .. }
            | Error::InvalidWorkingDirectory(_)
            | Error::InputUnavailable { .. }
            | Error::SpawnFailed { .. } => ErrorCategory::Spawn,
            Error::Stream { .. } => ErrorCategory::Stream,
            Error::MalformedDocument { .. } => ErrorCategory::MalformedDocument,
            Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::NotInitialized(_) | Error::PlanFileMissing(_) => ErrorCategory::Precondition,
            Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error happened before any process was created.
    pub fn is_spawn_failure(&self) -> bool {
        self.category() == ErrorCategory::Spawn
    }

    pub(crate) fn malformed(kind: DocumentKind, err: &serde_json::Error) -> Self {
        Error::MalformedDocument {
            kind,
            message: err.to_string(),
        }
    }
}

/// Result type for tfkit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_variants_share_category() {
        let missing = Error::ExecutableNotFound {
            program: "terraform".into(),
        };
        let bad_dir = Error::InvalidWorkingDirectory(PathBuf::from("/nope"));
        assert_eq!(missing.category(), ErrorCategory::Spawn);
        assert_eq!(bad_dir.category(), ErrorCategory::Spawn);
        assert!(missing.is_spawn_failure());
    }

    #[test]
    fn test_malformed_is_not_spawn_failure() {
        let err = Error::MalformedDocument {
            kind: DocumentKind::Plan,
            message: "missing field `resource_changes`".into(),
        };
        assert_eq!(err.category(), ErrorCategory::MalformedDocument);
        assert!(!err.is_spawn_failure());
        assert_eq!(
            err.to_string(),
            "malformed plan document: missing field `resource_changes`"
        );
    }

    #[test]
    fn test_precondition_category() {
        let err = Error::NotInitialized(PathBuf::from("/work"));
        assert_eq!(err.category(), ErrorCategory::Precondition);
        assert_eq!(err.category().description(), "Step not ready");
    }
}
