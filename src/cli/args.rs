//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Build, display and persist in-memory business object trees
#[derive(Parser, Debug)]
#[command(name = "bomgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level, repeat for more (-d -d -d)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Print author and version information
    #[arg(long)]
    pub info: bool,

    /// Build the built-in sample tree
    #[arg(short, long, global = true)]
    pub builtin: bool,

    /// Serialized object tree to restore
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the object tree as CSV records
    Dump,

    /// Print the object tree as a tree
    Tree,

    /// Serialize the object tree to a file
    Save {
        /// Output file
        #[arg(value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,

    /// Show config file locations
    Path,
}
