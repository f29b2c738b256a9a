//! # tfkit
//!
//! Supervised Terraform command execution and plan/state change models.
//!
//! This crate provides:
//! - A line-streaming, cancellable subprocess runner ([`process`])
//! - A normalized change-set model of a saved plan ([`plan`])
//! - A resource inventory of a state file ([`state`])
//! - A [`Client`] tying them to a working directory
//!
//! ## Example
//!
//! ```no_run
//! use tfkit::{Client, PlanOptions};
//!
//! let client = Client::new("infra");
//!
//! let mut handle = client.spawn_plan(&PlanOptions::new().with_var_file("dev.tfvars"))?;
//! for line in handle.lines() {
//!     println!("{}", line?);
//! }
//! if handle.wait()?.success() {
//!     let model = client.show_plan()?;
//!     println!("{} to create", model.counts().create);
//! }
//! # Ok::<(), tfkit::Error>(())
//! ```
//!
//! Cancelling a run from another thread:
//!
//! ```no_run
//! use tfkit::Client;
//! use std::time::Duration;
//!
//! let client = Client::new(".");
//! let handle = client.spawn(["apply", "tfplan.out"])?;
//! let cancel = handle.cancel_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(Duration::from_secs(600));
//!     cancel.cancel();
//! });
//! let termination = handle.wait()?;
//! # Ok::<(), tfkit::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod plan;
pub mod process;
pub mod state;
pub mod types;

pub use error::{DocumentKind, Error, ErrorCategory, Result};
pub use plan::{Action, ActionCounts, ChangeRecord, ChangeSetModel, DisplayAction, ModuleGroup};
pub use process::{
    CancelHandle, Captured, CommandInvocation, InterruptGuard, OutputSink, ProcessHandle,
    ProcessRunner, Termination,
};
pub use state::{ResourceGroup, ResourceMode, ResourceRecord, StateModel};
pub use types::{DEFAULT_BINARY, DEFAULT_PLAN_FILE, DEFAULT_STATE_FILE, PlanOptions};

use log::debug;
use std::path::{Path, PathBuf};

/// Runs the workflow commands inside one working directory.
///
/// The client holds no process state: every `spawn_*` call starts a fresh
/// child and hands its [`ProcessHandle`] to the caller.
#[derive(Debug, Clone)]
pub struct Client {
    workdir: PathBuf,
    binary: String,
    runner: ProcessRunner,
    plan_file: PathBuf,
    state_file: PathBuf,
}

impl Client {
    /// Create a client for `workdir` with default settings.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            binary: DEFAULT_BINARY.to_string(),
            runner: ProcessRunner::new(),
            plan_file: PathBuf::from(DEFAULT_PLAN_FILE),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }

    /// Use a different program (name on PATH or a path).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Use a runner with custom settings.
    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Set the saved-plan file, relative to the working directory.
    pub fn with_plan_file(mut self, plan_file: impl Into<PathBuf>) -> Self {
        self.plan_file = plan_file.into();
        self
    }

    /// Set the state file, relative to the working directory.
    pub fn with_state_file(mut self, state_file: impl Into<PathBuf>) -> Self {
        self.state_file = state_file.into();
        self
    }

    /// The working directory every command runs in.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Program that is run (`terraform` by default).
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runner used for every spawned command.
    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Absolute (or workdir-joined) path of the saved plan.
    pub fn plan_path(&self) -> PathBuf {
        self.workdir.join(&self.plan_file)
    }

    /// Absolute (or workdir-joined) path of the state file.
    pub fn state_path(&self) -> PathBuf {
        self.workdir.join(&self.state_file)
    }

    /// Check if `init` has been run (a `.terraform` directory exists).
    pub fn is_initialized(&self) -> bool {
        self.workdir.join(".terraform").exists()
    }

    /// Check if a saved plan exists.
    pub fn has_plan(&self) -> bool {
        self.plan_path().is_file()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Build an invocation of the binary with `args` in the working directory.
    pub fn invocation<I, S>(&self, args: I) -> CommandInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandInvocation::new(self.binary.clone(), self.workdir.clone()).args(args)
    }

    /// Spawn the binary with arbitrary arguments.
    pub fn spawn<I, S>(&self, args: I) -> Result<ProcessHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.invocation(args);
        debug!("running {}", invocation.command_line());
        self.runner.spawn(&invocation)
    }

    /// Arguments for `init`.
    pub fn init_args(&self) -> Vec<String> {
        vec!["init".to_string()]
    }

    /// `plan -out=<plan_file>` followed by one `-var-file <f>` pair per file.
    pub fn plan_args(&self, options: &PlanOptions) -> Vec<String> {
        let mut args = vec![
            "plan".to_string(),
            format!("-out={}", self.plan_file.display()),
        ];
        for var_file in &options.var_files {
            args.push("-var-file".to_string());
            args.push(var_file.clone());
        }
        args
    }

    /// `apply <plan_file>`, applying the saved plan.
    pub fn apply_args(&self) -> Vec<String> {
        vec!["apply".to_string(), self.plan_file.display().to_string()]
    }

    /// Spawn `init`.
    pub fn spawn_init(&self) -> Result<ProcessHandle> {
        self.spawn(self.init_args())
    }

    /// Spawn `plan`. Fails with [`Error::NotInitialized`] before `init`.
    pub fn spawn_plan(&self, options: &PlanOptions) -> Result<ProcessHandle> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized(self.workdir.clone()));
        }
        self.spawn(self.plan_args(options))
    }

    /// Spawn `apply` of the saved plan. Fails with
    /// [`Error::PlanFileMissing`] when no plan has been saved.
    pub fn spawn_apply(&self) -> Result<ProcessHandle> {
        if !self.has_plan() {
            return Err(Error::PlanFileMissing(self.plan_path()));
        }
        self.spawn(self.apply_args())
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Load the saved plan through `show -json` and build its model.
    pub fn show_plan(&self) -> Result<ChangeSetModel> {
        if !self.has_plan() {
            return Err(Error::PlanFileMissing(self.plan_path()));
        }

        let plan_file = self.plan_file.display().to_string();
        let invocation = self.invocation(["show", "-json", plan_file.as_str()]);
        let captured = self.runner.capture(&invocation)?;

        if !captured.success() {
            return Err(Error::CommandFailed {
                message: format!("{} ({})", invocation.command_line(), captured.termination),
                stderr: captured.stderr,
            });
        }

        ChangeSetModel::from_slice(&captured.stdout)
    }

    /// Load the state file, or `None` when there is none yet.
    pub fn load_state(&self) -> Result<Option<StateModel>> {
        let path = self.state_path();
        if !path.exists() {
            debug!("no state file at {}", path.display());
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        StateModel::from_slice(&bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_plan_args() {
        let client = Client::new("/work");
        let opts = PlanOptions::new()
            .with_var_file("dev.tfvars")
            .with_var_file("secrets.tfvars");

        assert_eq!(
            client.plan_args(&opts),
            vec![
                "plan",
                "-out=tfplan.out",
                "-var-file",
                "dev.tfvars",
                "-var-file",
                "secrets.tfvars"
            ]
        );
        assert_eq!(client.plan_args(&PlanOptions::new()), vec!["plan", "-out=tfplan.out"]);
    }

    #[test]
    fn test_init_and_apply_args() {
        let client = Client::new("/work").with_plan_file("custom.plan");
        assert_eq!(client.init_args(), vec!["init"]);
        assert_eq!(client.apply_args(), vec!["apply", "custom.plan"]);
        assert_eq!(client.plan_path(), PathBuf::from("/work/custom.plan"));
    }

    #[test]
    fn test_plan_requires_init() {
        let dir = TempDir::new().unwrap();
        let client = Client::new(dir.path());

        assert!(!client.is_initialized());
        let err = client.spawn_plan(&PlanOptions::new()).unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
        assert_eq!(err.category(), ErrorCategory::Precondition);

        fs::create_dir(dir.path().join(".terraform")).unwrap();
        assert!(client.is_initialized());
    }

    #[test]
    fn test_apply_requires_plan_file() {
        let dir = TempDir::new().unwrap();
        let client = Client::new(dir.path());

        assert!(matches!(
            client.spawn_apply().unwrap_err(),
            Error::PlanFileMissing(_)
        ));
        assert!(matches!(
            client.show_plan().unwrap_err(),
            Error::PlanFileMissing(_)
        ));
    }

    #[test]
    fn test_load_state_missing_file() {
        let dir = TempDir::new().unwrap();
        let client = Client::new(dir.path());
        assert!(client.load_state().unwrap().is_none());
    }

    #[test]
    fn test_load_state() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("terraform.tfstate"),
            r#"{"version": 4, "resources": [{"mode": "managed", "type": "aws_instance", "name": "web"}]}"#,
        )
        .unwrap();

        let state = Client::new(dir.path()).load_state().unwrap().unwrap();
        assert_eq!(state.resource_count(), 1);
        assert_eq!(state.groups()[0].resource_type(), "aws_instance");
    }

    #[test]
    fn test_load_state_malformed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("terraform.tfstate"), "{").unwrap();

        let err = Client::new(dir.path()).load_state().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MalformedDocument);
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script standing in for terraform.
        fn fake_terraform(bin_dir: &Path, body: &str) -> String {
            let path = bin_dir.join("terraform");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        #[test]
        fn test_spawn_streams_arguments() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            let client = Client::new(work.path())
                .with_binary(fake_terraform(bin.path(), r#"for a in "$@"; do echo "$a"; done"#));

            let mut handle = client.spawn_init().unwrap();
            let lines: Vec<String> = handle.lines().map(|l| l.unwrap()).collect();
            assert_eq!(lines, vec!["init"]);
            assert!(handle.wait().unwrap().success());
        }

        #[test]
        fn test_spawn_plan_when_initialized() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            fs::create_dir(work.path().join(".terraform")).unwrap();
            let client = Client::new(work.path())
                .with_binary(fake_terraform(bin.path(), r#"echo "$@""#));

            let mut handle = client
                .spawn_plan(&PlanOptions::new().with_var_file("dev.tfvars"))
                .unwrap();
            let lines: Vec<String> = handle.lines().map(|l| l.unwrap()).collect();
            assert_eq!(lines, vec!["plan -out=tfplan.out -var-file dev.tfvars"]);
            handle.wait().unwrap();
        }

        #[test]
        fn test_show_plan() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            fs::write(work.path().join("tfplan.out"), "binary plan").unwrap();

            let script = r#"
if [ "$1" = "show" ] && [ "$2" = "-json" ] && [ "$3" = "tfplan.out" ]; then
  echo 'refreshing...' >&2
  echo '{"resource_changes": [{"address": "module.net.aws_vpc.main", "change": {"actions": ["create"]}}]}'
else
  exit 9
fi"#;
            let client = Client::new(work.path()).with_binary(fake_terraform(bin.path(), script));

            let model = client.show_plan().unwrap();
            assert_eq!(model.counts().create, 1);
            assert_eq!(model.groups()[0].key(), "module.net");
        }

        #[test]
        fn test_show_plan_command_failure() {
            let bin = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            fs::write(work.path().join("tfplan.out"), "binary plan").unwrap();
            let client = Client::new(work.path())
                .with_binary(fake_terraform(bin.path(), "echo 'bad plan' >&2; exit 1"));

            match client.show_plan() {
                Err(Error::CommandFailed { stderr, .. }) => assert_eq!(stderr.trim(), "bad plan"),
                other => panic!("expected CommandFailed, got {other:?}"),
            }
        }
    }
}
