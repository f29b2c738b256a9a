//! Loading and printing plan and state trees.

use anyhow::{Context as _, Result};
use std::fs;
use std::path::Path;
use tfkit::{ChangeSetModel, Client};

use crate::Context;
use crate::commands::terraform::explain;
use crate::progress;
use crate::render;
use crate::ui;

/// `tfc show`: the saved plan, or a plan JSON file from disk
pub fn show(ctx: &Context, file: Option<&Path>) -> Result<()> {
    let model = match file {
        Some(path) => load_plan_file(path)?,
        None => load_plan(&ctx.client())?,
    };
    print_plan(&model);
    Ok(())
}

/// `tfc state`: the configured state file, or another one
pub fn state(ctx: &Context, file: Option<&Path>) -> Result<()> {
    let client = match file {
        Some(path) => {
            let path = std::path::absolute(path)
                .with_context(|| format!("Invalid state path {}", path.display()))?;
            ctx.client().with_state_file(path)
        }
        None => ctx.client(),
    };
    show_state(&client)
}

/// Load the saved plan through `show -json`
pub fn load_plan(client: &Client) -> Result<ChangeSetModel> {
    let pb = progress::spinner("Loading plan...");
    match client.show_plan() {
        Ok(model) => {
            progress::finish_success(&pb, "Plan loaded successfully");
            Ok(model)
        }
        Err(err) => {
            progress::finish_clear(&pb);
            Err(explain(err).context("Error loading plan"))
        }
    }
}

/// Load a plan JSON document (`show -json` output saved to a file)
pub fn load_plan_file(path: &Path) -> Result<ChangeSetModel> {
    let bytes = fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    ChangeSetModel::from_slice(&bytes)
        .with_context(|| format!("Error loading plan from {}", path.display()))
}

pub fn print_plan(model: &ChangeSetModel) {
    ui::section("📋 Terraform Plan");
    ui::tree(&render::plan_tree(model));
}

/// Load and print the state tree, warning when there is no state file yet
pub fn show_state(client: &Client) -> Result<()> {
    ui::section("🌳 Current State");
    match client.load_state().context("Error loading state")? {
        Some(model) => {
            ui::tree(&render::state_tree(&model));
            ui::success("Loaded current state");
        }
        None => ui::warn("No state file found"),
    }
    Ok(())
}
