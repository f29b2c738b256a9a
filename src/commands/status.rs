use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::render;
use crate::scanner::WorkdirInfo;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let info = WorkdirInfo::detect(&ctx.workdir)?;
    let client = ctx.client();

    print_header(&info);
    ui::header("Working Directory");

    ui::kv("Path", &ctx.workdir.display().to_string());
    ui::kv("Binary", &ctx.binary);
    ui::kv(
        "Provider",
        info.provider.map_or("not detected", |p| p.name()),
    );
    if let Some(provider) = info.provider {
        ui::kv(
            provider.account_env(),
            info.account.as_deref().unwrap_or("(unset)"),
        );
    }
    ui::kv("Var file", info.var_file.as_deref().unwrap_or("none"));
    ui::kv("State backend", &info.state_backend);
    ui::kv("Initialized", &yes_no(info.initialized));
    ui::kv(
        "Plan file",
        &present(&client.plan_path().display().to_string(), client.has_plan()),
    );
    let state_path = client.state_path();
    ui::kv(
        "State file",
        &present(&state_path.display().to_string(), state_path.exists()),
    );
    if let Some(timeout) = ctx.timeout {
        ui::kv("Timeout", &format!("{}s", timeout.as_secs()));
    }

    println!();
    Ok(())
}

/// Print the one-line context header for the working directory
pub fn print_header(info: &WorkdirInfo) {
    println!();
    println!("{} {}", "tfc".cyan().bold(), render::status_header(info));
    ui::dim(&format!("Current workdir: {}", info.name()));
}

fn yes_no(value: bool) -> String {
    if value {
        "✓ yes".green().to_string()
    } else {
        "✗ no".red().to_string()
    }
}

fn present(path: &str, exists: bool) -> String {
    if exists {
        path.to_string()
    } else {
        format!("{} {}", path, "(missing)".dimmed())
    }
}
