use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tfc")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Terminal companion for Terraform", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Terraform working directory
    #[arg(short = 'C', long = "dir", global = true, default_value = ".", value_name = "DIR")]
    pub dir: PathBuf,

    /// Program to run instead of the configured one
    #[arg(long, global = true, env = "TFC_BINARY", value_name = "PROG")]
    pub binary: Option<String>,

    /// Cancel runs that take longer than this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Interactive menu (default)
    Ui,

    /// Run `terraform init`
    Init,

    /// Run `terraform plan` and show the resulting change tree
    Plan(PlanArgs),

    /// Apply the saved plan
    Apply,

    /// Re-detect the working directory and reload state
    Refresh,

    /// Stream any terraform subcommand
    Run {
        /// Arguments passed to terraform
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the state file as a tree
    State {
        /// State file to read instead of the configured one
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Show a plan as a tree
    Show {
        /// Plan JSON document to read instead of running `show -json`
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Show the detected working directory context
    Status,

    /// Check the binary, working directory and config
    Doctor,

    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Default)]
pub struct PlanArgs {
    /// Variable file (repeatable); defaults to the first *.tfvars found
    #[arg(long = "var-file", value_name = "FILE")]
    pub var_files: Vec<String>,

    /// Don't load and render the plan afterwards
    #[arg(long)]
    pub no_show: bool,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
