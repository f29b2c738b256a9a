//! Command invocation values.

use std::path::{Path, PathBuf};

/// A single command to run: program, arguments, working directory and an
/// optional file to feed on stdin.
///
/// Built with the consuming builder methods and then handed to
/// [`ProcessRunner`](super::ProcessRunner) by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    stdin: Option<PathBuf>,
}

impl CommandInvocation {
    /// Create an invocation of `program` inside `working_dir`.
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            stdin: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Redirect stdin from a file.
    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Directory the program runs in.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// File fed on stdin, relative paths resolved against the working
    /// directory.
    pub fn stdin(&self) -> Option<&Path> {
        self.stdin.as_deref()
    }

    /// Human-readable command line, for display only (no shell quoting).
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_argument_order() {
        let inv = CommandInvocation::new("terraform", "/work")
            .arg("plan")
            .args(["-out=tfplan.out", "-var-file", "dev.tfvars"]);

        assert_eq!(inv.program(), "terraform");
        assert_eq!(
            inv.arguments(),
            ["plan", "-out=tfplan.out", "-var-file", "dev.tfvars"]
        );
        assert_eq!(inv.working_dir(), Path::new("/work"));
        assert!(inv.stdin().is_none());
    }

    #[test]
    fn test_command_line() {
        let bare = CommandInvocation::new("terraform", ".");
        assert_eq!(bare.command_line(), "terraform");

        let inv = bare.args(["apply", "tfplan.out"]);
        assert_eq!(inv.command_line(), "terraform apply tfplan.out");
    }

    #[test]
    fn test_stdin_redirect() {
        let inv = CommandInvocation::new("cat", ".").stdin_from("input.txt");
        assert_eq!(inv.stdin(), Some(Path::new("input.txt")));
    }
}
