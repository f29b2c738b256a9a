use anyhow::Result;
use std::path::Path;

use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::paths;
use crate::ui;

/// Runs without a loaded config so a broken file can still be inspected and
/// replaced.
pub fn run(cmd: ConfigCommand) -> Result<()> {
    let path = paths::config_file()?;
    match cmd {
        ConfigCommand::Show => show(&path),
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Init { force } => init(&path, force).map(|_| ()),
    }
}

fn show(path: &Path) -> Result<()> {
    ui::header("Configuration");
    if !path.exists() {
        ui::kv("File", &format!("{} (not created, showing defaults)", path.display()));
    } else {
        ui::kv("File", &path.display().to_string());
    }

    let config = match Config::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            ui::warn("The config file could not be loaded");
            ui::dim("Fix it, or replace it with the defaults: tfc config init --force");
            return Err(e);
        }
    };

    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Write the defaults to `path`. Returns whether a file was written.
fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        ui::warn(&format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
        return Ok(false);
    }

    let written = Config::default().save_to(path)?;
    ui::success(&format!("Wrote {}", written.display()));
    Ok(true)
}
