//! Streamed workflow commands: init, plan, apply, refresh and pass-through.

use anyhow::{Context as _, Result};
use tfkit::PlanOptions;

use crate::Context;
use crate::cli::PlanArgs;
use crate::commands::{documents, status};
use crate::runner;
use crate::scanner::WorkdirInfo;
use crate::ui;

pub fn init(ctx: &Context) -> Result<()> {
    let client = ctx.client();
    announce(ctx, "🚀 Initializing Terraform...")?;

    let label = ctx.label("init");
    let handle = client
        .spawn_init()
        .with_context(|| format!("Could not start {label}"))?;
    let termination = runner::stream(&label, handle, ctx.timeout)?;
    runner::ensure_success(&label, termination)
}

pub fn plan(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let client = ctx.client();
    let info = announce(ctx, "📋 Running terraform plan...")?;
    let options = plan_options(args, &info);

    let label = ctx.label("plan");
    let handle = client.spawn_plan(&options).map_err(explain)?;
    let termination = runner::stream(&label, handle, ctx.timeout)?;
    runner::ensure_success(&label, termination)?;

    if !args.no_show {
        let model = documents::load_plan(&client)?;
        documents::print_plan(&model);
    }
    Ok(())
}

pub fn apply(ctx: &Context) -> Result<()> {
    let client = ctx.client();
    announce(ctx, "✅ Applying Terraform plan...")?;

    let label = ctx.label("apply");
    let handle = client.spawn_apply().map_err(explain)?;
    let termination = runner::stream(&label, handle, ctx.timeout)?;

    // State changes even when apply fails part-way.
    documents::show_state(&client)?;
    runner::ensure_success(&label, termination)
}

pub fn refresh(ctx: &Context) -> Result<()> {
    announce(ctx, "🔄 Refreshing...")?;
    documents::show_state(&ctx.client())
}

/// Stream an arbitrary subcommand
pub fn run(ctx: &Context, args: &[String]) -> Result<()> {
    let client = ctx.client();
    announce(ctx, &format!("Running {}", ctx.label(&args.join(" "))))?;

    let label = ctx.label(args.first().map_or("", String::as_str));
    let handle = client
        .spawn(args.iter().cloned())
        .with_context(|| format!("Could not start {label}"))?;
    let termination = runner::stream(&label, handle, ctx.timeout)?;
    runner::ensure_success(&label, termination)
}

/// Var files from the command line, else the detected one
pub fn plan_options(args: &PlanArgs, info: &WorkdirInfo) -> PlanOptions {
    if !args.var_files.is_empty() {
        return PlanOptions {
            var_files: args.var_files.clone(),
        };
    }
    match &info.var_file {
        Some(var_file) => PlanOptions::new().with_var_file(var_file.clone()),
        None => PlanOptions::new(),
    }
}

/// Attach the workflow hint to precondition failures
pub fn explain(err: tfkit::Error) -> anyhow::Error {
    let hint = match &err {
        tfkit::Error::NotInitialized(_) => "Please run init first!",
        tfkit::Error::PlanFileMissing(_) => "No plan file found. Run plan first!",
        _ => return err.into(),
    };
    anyhow::Error::new(err).context(hint)
}

/// Print the context header and the action message, returning what was
/// detected
fn announce(ctx: &Context, message: &str) -> Result<WorkdirInfo> {
    let info = WorkdirInfo::detect(&ctx.workdir)?;
    if !ctx.quiet {
        status::print_header(&info);
        ui::info(message);
    }
    Ok(info)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn info(var_file: Option<&str>) -> WorkdirInfo {
        WorkdirInfo {
            workdir: PathBuf::from("/work"),
            var_file: var_file.map(str::to_string),
            provider: None,
            account: None,
            state_backend: "local".into(),
            initialized: true,
        }
    }

    #[test]
    fn test_plan_options_prefer_cli_var_files() {
        let args = PlanArgs {
            var_files: vec!["prod.tfvars".into()],
            no_show: false,
        };
        let options = plan_options(&args, &info(Some("dev.tfvars")));
        assert_eq!(options.var_files, vec!["prod.tfvars"]);
    }

    #[test]
    fn test_plan_options_fall_back_to_detected() {
        let options = plan_options(&PlanArgs::default(), &info(Some("dev.tfvars")));
        assert_eq!(options.var_files, vec!["dev.tfvars"]);

        let options = plan_options(&PlanArgs::default(), &info(None));
        assert!(options.var_files.is_empty());
    }

    #[test]
    fn test_explain_adds_hint() {
        let err = explain(tfkit::Error::NotInitialized(PathBuf::from("/work")));
        assert_eq!(err.to_string(), "Please run init first!");
        assert!(err.downcast_ref::<tfkit::Error>().is_some());

        let err = explain(tfkit::Error::PlanFileMissing(PathBuf::from("/work/tfplan.out")));
        assert_eq!(err.to_string(), "No plan file found. Run plan first!");

        let err = explain(tfkit::Error::ExecutableNotFound {
            program: "terraform".into(),
        });
        assert_eq!(err.to_string(), "executable not found: terraform");
    }
}
