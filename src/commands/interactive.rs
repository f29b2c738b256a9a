//! Menu-driven session over the working directory.

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use dialoguer::{Confirm, Select};

use crate::Context;
use crate::cli::PlanArgs;
use crate::commands::{documents, status, terraform};
use crate::scanner::WorkdirInfo;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Init,
    Plan,
    Apply,
    Refresh,
    ShowState,
    ShowPlan,
    Quit,
}

impl MenuAction {
    const ALL: [Self; 7] = [
        Self::Init,
        Self::Plan,
        Self::Apply,
        Self::Refresh,
        Self::ShowState,
        Self::ShowPlan,
        Self::Quit,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Init => "🚀 Init",
            Self::Plan => "📋 Plan",
            Self::Apply => "✅ Apply",
            Self::Refresh => "🔄 Refresh",
            Self::ShowState => "🌳 Show state",
            Self::ShowPlan => "📊 Show plan",
            Self::Quit => "👋 Quit",
        }
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    if !console::Term::stdout().is_term() {
        bail!("Interactive mode needs a terminal; use a subcommand instead (see `tfc --help`)");
    }

    println!("{}", "🚀 tfc started - Ready for Terraform operations!".bold());
    let mut info = WorkdirInfo::detect(&ctx.workdir)?;
    status::print_header(&info);
    if let Err(err) = documents::show_state(&ctx.client()) {
        crate::report_error(&err);
    }

    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();
    let mut default = 0;

    loop {
        println!();
        let Some(index) = Select::new()
            .with_prompt("Action")
            .items(&labels)
            .default(default)
            .interact_opt()
            .context("Failed to read menu selection")?
        else {
            break;
        };

        let action = MenuAction::ALL[index];
        if action == MenuAction::Quit {
            break;
        }
        default = index;

        if let Err(err) = perform(ctx, action, &info) {
            crate::report_error(&err);
        }

        if matches!(action, MenuAction::Init | MenuAction::Refresh) {
            info = WorkdirInfo::detect(&ctx.workdir)?;
        }
    }

    ui::dim("Bye!");
    Ok(())
}

fn perform(ctx: &Context, action: MenuAction, info: &WorkdirInfo) -> Result<()> {
    match action {
        MenuAction::Init => terraform::init(ctx),
        MenuAction::Plan => terraform::plan(ctx, &PlanArgs::default()),
        MenuAction::Apply => {
            if !ctx.client().has_plan() {
                // Let the client produce the usual error
                return terraform::apply(ctx);
            }
            let confirmed = Confirm::new()
                .with_prompt("Apply the saved plan?")
                .default(false)
                .interact()
                .context("Failed to read user input")?;
            if confirmed {
                terraform::apply(ctx)
            } else {
                ui::info("Aborted. No changes made.");
                Ok(())
            }
        }
        MenuAction::Refresh => terraform::refresh(ctx),
        MenuAction::ShowState => {
            status::print_header(info);
            documents::show_state(&ctx.client())
        }
        MenuAction::ShowPlan => {
            status::print_header(info);
            documents::show(ctx, None)
        }
        MenuAction::Quit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_labels_are_unique() {
        let mut labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), MenuAction::ALL.len());
    }

    #[test]
    fn test_quit_is_last() {
        assert_eq!(MenuAction::ALL.last(), Some(&MenuAction::Quit));
    }
}
