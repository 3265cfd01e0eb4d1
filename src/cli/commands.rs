//! Command dispatch

use std::io;
use std::path::Path;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::{load_session, save_session};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::CliResult;
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::walker;

pub fn execute_command(cli: &Cli, settings: &Settings) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Dump) | None => cmd_dump(settings),
        Some(Commands::Tree) => cmd_tree(settings),
        Some(Commands::Save { output }) => cmd_save(settings, output),
        Some(Commands::Config { command }) => cmd_config(command, settings),
        Some(Commands::Completion { shell }) => {
            cmd_completion(*shell);
            Ok(())
        }
    }
}

#[instrument(skip(settings))]
fn cmd_dump(settings: &Settings) -> CliResult<()> {
    let store = load_session(settings)?;
    let dump = walker::dump(&store, &store.root_ref());
    debug!("dump has {} records", dump.lines().count());
    print!("{}", dump);
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_tree(settings: &Settings) -> CliResult<()> {
    let store = load_session(settings)?;
    print!("{}", walker::tree(&store, &store.root_ref()));
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_save(settings: &Settings, output_path: &Path) -> CliResult<()> {
    let store = load_session(settings)?;
    save_session(&store, output_path)?;
    output::success(&format!("saved object tree to {}", output_path.display()));
    Ok(())
}

fn cmd_config(command: &ConfigCommands, settings: &Settings) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::header("Effective settings");
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unavailable>".to_string());
            output::action("global", &global);
            if let Ok(dir) = std::env::current_dir() {
                output::action("local", &local_config_path(&dir).display());
            }
        }
    }
    Ok(())
}

fn cmd_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
