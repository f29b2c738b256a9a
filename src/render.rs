//! Text trees for plans, state and the workdir header.
//!
//! Everything here returns plain lines; color is applied when printing.

use tfkit::{ChangeSetModel, DisplayAction, ResourceMode, StateModel};

use crate::scanner::WorkdirInfo;

pub fn action_icon(action: DisplayAction) -> &'static str {
    match action {
        DisplayAction::Create => "🟢",
        DisplayAction::Update => "🟡",
        DisplayAction::Delete => "🔴",
        DisplayAction::Replace => "🔵",
        DisplayAction::Unknown => "⚪",
    }
}

/// Only managed resources get the wrench; data and any other mode read as
/// data.
fn mode_icon(mode: &ResourceMode) -> &'static str {
    if mode.is_managed() { "🔧" } else { "📊" }
}

/// Summary counters followed by changes grouped per module
pub fn plan_tree(model: &ChangeSetModel) -> Vec<String> {
    let counts = model.counts();
    let mut lines = vec![
        "📊 Summary".to_string(),
        format!("  🟢 Create: {}", counts.create),
        format!("  🟡 Update: {}", counts.update),
        format!("  🔴 Delete: {}", counts.delete),
        format!("  🔵 Replace: {}", counts.replace),
        "📦 Resource Changes".to_string(),
    ];

    for group in model.groups() {
        lines.push(format!("  📁 {} ({})", group.key(), group.len()));
        for change in group.changes() {
            lines.push(format!(
                "    {} {}",
                action_icon(change.display_action()),
                change.address()
            ));
        }
    }

    lines
}

/// Resources grouped per type
pub fn state_tree(model: &StateModel) -> Vec<String> {
    if model.is_empty() {
        return vec!["❌ No state data available".to_string()];
    }

    let mut lines = Vec::new();
    for group in model.groups() {
        lines.push(format!("📦 {} ({})", group.resource_type(), group.len()));
        for resource in group.resources() {
            lines.push(format!("  {} {}", mode_icon(resource.mode()), resource.name()));
        }
    }
    lines
}

/// One-line context: provider, var file, backend, init status
pub fn status_header(info: &WorkdirInfo) -> String {
    let provider = match (&info.provider, &info.account) {
        (Some(provider), Some(account)) => format!("{provider}: {account}"),
        (Some(provider), None) => provider.to_string(),
        (None, _) => "Not detected".to_string(),
    };
    let var_file = info
        .var_file
        .as_ref()
        .map(|f| format!("tfvars: {f}"))
        .unwrap_or_else(|| "No var file".to_string());
    let init = if info.initialized { "✓" } else { "✗" };

    format!(
        "[{provider}] [{var_file}] [State: {}] [Init: {init}]",
        info.state_backend
    )
}

// ============================================================================
// Tests
// ============================================================================
