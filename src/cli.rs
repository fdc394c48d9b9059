//! CLI struct definitions for the `parley` command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "parley",
    version = env!("CARGO_PKG_VERSION"),
    about = "Runs the inline commands embedded in assistant or user chat text, under a principal x mode permission matrix.",
    disable_version_flag = true
)]
pub(crate) struct Cli {
    /// Config file (defaults to .parley/parley.toml under the project root).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Interpret text and print the enriched transcript
    Run(RunCli),
    /// Print the system prompt for a mode
    Prompt(PromptCli),
    /// Print the static permission tables
    Matrix(MatrixCli),
    /// Manage persisted permission overrides
    Override(OverrideCli),
    /// Manage roster and status data
    Data(DataCli),
    /// Create the store and its databases
    Init,
    /// Show version information
    Version,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunCli {
    /// Acting principal: human-admin, assistant, background-agent, system.
    #[clap(long)]
    pub principal: String,
    /// Mode requested for this turn (name or 0/1/2).
    #[clap(long)]
    pub mode: Option<String>,
    /// Mode granted to the session (name or 0/1/2).
    #[clap(long)]
    pub session_mode: Option<String>,
    /// Read text from this file instead of stdin.
    #[clap(long)]
    pub file: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct PromptCli {
    /// Mode to describe (name or 0/1/2).
    #[clap(long, default_value = "chat-only")]
    pub mode: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct MatrixCli {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct OverrideCli {
    #[clap(subcommand)]
    pub command: OverrideCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum OverrideCommand {
    /// Allow or deny a command for a principal, regardless of mode
    Set {
        #[clap(long)]
        principal: String,
        #[clap(long)]
        command: String,
        /// 'allow' or 'deny'.
        #[clap(long)]
        decision: String,
        #[clap(long, default_value = "cli")]
        actor: String,
    },
    /// Remove an override so the static tables apply again
    Clear {
        #[clap(long)]
        principal: String,
        #[clap(long)]
        command: String,
        #[clap(long, default_value = "cli")]
        actor: String,
    },
    /// List overrides
    List {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct DataCli {
    #[clap(subcommand)]
    pub command: DataCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DataCommand {
    /// Add or update a roster entry
    RosterAdd {
        #[clap(long)]
        name: String,
        #[clap(long)]
        role: String,
        #[clap(long, default_value = "")]
        address: String,
        #[clap(long, default_value = "cli")]
        actor: String,
    },
    /// Record the state of a component
    StatusSet {
        #[clap(long)]
        component: String,
        #[clap(long)]
        state: String,
        #[clap(long, default_value = "")]
        detail: String,
        #[clap(long, default_value = "cli")]
        actor: String,
    },
}
