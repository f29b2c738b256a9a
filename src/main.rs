mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod render;
mod runner;
mod scanner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tfkit::{Client, ProcessRunner};

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Resolved Terraform working directory
    pub workdir: PathBuf,
    pub config: config::Config,
    /// Program to run (`--binary` over the config file)
    pub binary: String,
    /// Watchdog timeout (`--timeout` over the config file)
    pub timeout: Option<Duration>,
}

impl Context {
    /// A client for the working directory with the effective settings
    pub fn client(&self) -> Client {
        Client::new(&self.workdir)
            .with_binary(&self.binary)
            .with_runner(ProcessRunner::new().with_grace_period(self.config.grace_period()))
            .with_plan_file(&self.config.terraform.plan_file)
            .with_state_file(&self.config.terraform.state_file)
    }

    /// Display label for a subcommand, e.g. `terraform plan`
    pub fn label(&self, subcommand: &str) -> String {
        format!("{} {subcommand}", self.binary)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Command::Ui);

    // Commands that don't need a working directory
    match command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tfc", &mut io::stdout());
            return Ok(());
        }
        Command::Doctor => return commands::doctor::run(&cli.dir, cli.binary.as_deref()),
        // Must work even when config.toml is broken
        Command::Config(cmd) => return commands::config::run(cmd),
        _ => {}
    }

    let config = config::Config::load()?;

    let ctx = Context {
        quiet: cli.quiet,
        workdir: paths::resolve_workdir(&cli.dir)?,
        binary: cli
            .binary
            .unwrap_or_else(|| config.terraform.binary.clone()),
        timeout: match cli.timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => config.timeout(),
        },
        config,
    };

    match command {
        Command::Ui => commands::interactive::run(&ctx),
        Command::Init => commands::terraform::init(&ctx),
        Command::Plan(args) => commands::terraform::plan(&ctx, &args),
        Command::Apply => commands::terraform::apply(&ctx),
        Command::Refresh => commands::terraform::refresh(&ctx),
        Command::Run { args } => commands::terraform::run(&ctx, &args),
        Command::State { file } => commands::documents::state(&ctx, file.as_deref()),
        Command::Show { file } => commands::documents::show(&ctx, file.as_deref()),
        Command::Status => commands::status::run(&ctx),
        // Handled before the config is loaded
        Command::Doctor | Command::Config(_) | Command::Completions { .. } => Ok(()),
    }
}

/// Print an error with its context chain and, for tfkit failures, what kind
/// of failure it was.
pub fn report_error(err: &anyhow::Error) {
    // The streamed run already printed its own outcome line.
    if err.downcast_ref::<runner::RunError>().is_some() {
        return;
    }

    ui::error(&format!("{err:#}"));
    if let Some(tf_err) = err.chain().find_map(|e| e.downcast_ref::<tfkit::Error>()) {
        if let tfkit::Error::CommandFailed { stderr, .. } = tf_err {
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                eprintln!("  {line}");
            }
        }
        ui::category(tf_err.category());
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<runner::RunError>()
        .map_or(1, runner::RunError::exit_code)
}
