use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::Path;
use tfkit::{Client, CommandInvocation, ProcessRunner};

use crate::config::Config;
use crate::paths;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

pub fn run(dir: &Path, binary: Option<&str>) -> Result<()> {
    ui::header("Terraform Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    // Config first: it decides which binary to check
    let config = check_config(&mut issues);
    let binary = binary.unwrap_or(&config.terraform.binary);

    check_binary(binary, &mut issues);
    check_workdir(dir, &config, &mut issues);

    println!();
    if issues.is_empty() {
        ui::success("All checks passed!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }

    let fix_cmds: Vec<&str> = issues.iter().filter_map(|i| i.fix_cmd.as_deref()).collect();
    if !fix_cmds.is_empty() {
        ui::section("Quick Fixes");
        println!();
        for cmd in &fix_cmds {
            println!("    {}", cmd.bold());
        }
    }
}

fn check_config(issues: &mut Vec<Issue>) -> Config {
    ui::section("Configuration");

    let path = match paths::config_file() {
        Ok(path) => path,
        Err(e) => {
            println!("  {} could not determine config directory", "✗".red());
            issues.push(Issue {
                category: "Configuration",
                summary: "Could not determine config directory".into(),
                detail: Some(format!("{e:#}")),
                fix: Some(format!("Set ${} or $HOME", paths::ENV_CONFIG_DIR)),
                fix_cmd: None,
            });
            return Config::default();
        }
    };

    if !path.exists() {
        println!(
            "  {} {} {}",
            "✓".green(),
            path.display(),
            "(not present, using defaults)".dimmed()
        );
        return Config::default();
    }

    match Config::load_from(&path) {
        Ok(config) => {
            println!("  {} {}", "✓".green(), path.display());
            config
        }
        Err(e) => {
            println!("  {} {} {}", "⚠".yellow(), path.display(), "(invalid)".yellow());
            issues.push(Issue {
                category: "Configuration",
                summary: "config.toml has invalid format".into(),
                detail: Some(format!("{:#}", e.root_cause())),
                fix: Some("Fix the file, or regenerate it with the defaults".into()),
                fix_cmd: Some("tfc config init --force".into()),
            });
            Config::default()
        }
    }
}

fn check_binary(binary: &str, issues: &mut Vec<Issue>) {
    ui::section("Binary");

    let cwd = std::env::temp_dir();
    let invocation = CommandInvocation::new(binary, cwd).arg("version");
    match ProcessRunner::new().capture(&invocation) {
        Ok(captured) if captured.success() => {
            let stdout = captured.stdout_str();
            let version = stdout.lines().next().unwrap_or("").trim();
            println!("  {} {} - {}", "✓".green(), binary, version.dimmed());
        }
        Ok(captured) => {
            println!("  {} {} {}", "⚠".yellow(), binary, "(version failed)".yellow());
            issues.push(Issue {
                category: "Binary",
                summary: format!("`{binary} version` {}", captured.termination),
                detail: Some(captured.stderr.trim().to_string()).filter(|s| !s.is_empty()),
                fix: Some("Check that the binary is a working Terraform install".into()),
                fix_cmd: None,
            });
        }
        Err(e) => {
            println!("  {} {} {}", "✗".red(), binary, "(missing)".red());
            let fix_cmd = e
                .is_spawn_failure()
                .then(|| "tfc --binary <path> doctor".to_string());
            issues.push(Issue {
                category: "Binary",
                summary: e.to_string(),
                detail: Some(e.category().description().to_string()),
                fix: Some(e.category().advice().to_string()),
                fix_cmd,
            });
        }
    }
}

fn check_workdir(dir: &Path, config: &Config, issues: &mut Vec<Issue>) {
    ui::section("Working Directory");

    let workdir = match paths::resolve_workdir(dir) {
        Ok(workdir) => workdir,
        Err(e) => {
            println!("  {} {}", "✗".red(), dir.display());
            issues.push(Issue {
                category: "Working Directory",
                summary: format!("{e:#}"),
                detail: None,
                fix: Some("Point -C/--dir at a Terraform configuration".into()),
                fix_cmd: None,
            });
            return;
        }
    };
    println!("  {} {}", "✓".green(), workdir.display());

    let tf_files = count_tf_files(&workdir);
    if tf_files == 0 {
        println!("  {} {}", "⚠".yellow(), "no *.tf files".yellow());
        issues.push(Issue {
            category: "Working Directory",
            summary: "No Terraform configuration files found".into(),
            detail: Some(workdir.display().to_string()),
            fix: Some("Run tfc from a directory containing *.tf files".into()),
            fix_cmd: None,
        });
    } else {
        println!("  {} {} .tf file(s)", "✓".green(), tf_files);
    }

    let client = Client::new(&workdir)
        .with_plan_file(&config.terraform.plan_file)
        .with_state_file(&config.terraform.state_file);
    if client.is_initialized() {
        println!("  {} initialized", "✓".green());
    } else {
        println!("  {} {}", "⚠".yellow(), "not initialized".yellow());
        issues.push(Issue {
            category: "Working Directory",
            summary: "Working directory is not initialized".into(),
            detail: Some("No .terraform directory".into()),
            fix: Some("Initialize providers and modules".into()),
            fix_cmd: Some(format!("tfc -C {} init", workdir.display())),
        });
    }

    let plan = client.plan_path();
    if client.has_plan() {
        println!("  {} saved plan {}", "✓".green(), plan.display());
    } else {
        println!("  {} {}", "·".dimmed(), format!("no saved plan at {}", plan.display()).dimmed());
    }
}

fn count_tf_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "tf"))
                .count()
        })
        .unwrap_or(0)
}
