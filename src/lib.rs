//! Parley: an inline-command interpreter for conversational assistants.
//!
//! **Parley runs the commands an assistant (or a user) writes into chat text.**
//!
//! Text from an untrusted channel is scanned for invocations such as
//! `@read-file notes.md` or a block-form `@create-file` with a `<<<`/`>>>`
//! body. Each invocation is checked against a two-dimensional permission
//! matrix (principal x mode, with persisted overrides), dispatched to a
//! capability handler, and its result is stitched back into the text after
//! the line it came from.
//!
//! # Pipeline
//!
//! - **Mode resolution** (`core::mode`): request and session hints, narrowest
//!   wins, anything unknown is `chat-only`.
//! - **Extraction** (`core::grammar`, `core::extractor`): line-oriented
//!   tokenizer producing an ordered list of invocations or malformed
//!   candidates. A block body can never swallow a later invocation.
//! - **Authorization** (`core::permission`, `core::overrides`): static tables
//!   plus overrides snapshotted once per pass; unreadable overrides fail closed.
//! - **Dispatch** (`core::dispatcher`): one invocation at a time, each handler
//!   on a worker thread with a time budget, failures contained to the one
//!   invocation.
//! - **Assembly** (`core::assembler`): the enriched transcript.
//! - **Prompting** (`core::prompt`): the mode-specific instructions generated
//!   from the same mode table the matrix uses.
//!
//! Capabilities (`plugins`) are traits with local adapters: a root-confined
//! filesystem, a process sandbox with named targets, and SQLite-backed roster
//! and status queries.
//!
//! # Store
//!
//! `.parley/data/` holds `overrides.db`, `data.db` and `broker.events.jsonl`.
//! Administrative writes route through `DbBroker`, which serialises them and
//! appends one audit line each. Transcripts are never persisted.
//!
//! # Examples
//!
//! ```bash
//! parley init
//! echo '@list-directory' | parley run --principal assistant --mode chat-only
//! parley override set --principal assistant --command delete-file --decision allow
//! parley prompt --mode hybrid
//! ```

pub mod core;
pub mod plugins;

mod cli;
mod subsystems;

use crate::cli::{Cli, Command, DataCommand, MatrixCli, OverrideCommand, RunCli};
use crate::core::command::CommandName;
use crate::core::config::{self, ParleyConfig};
use crate::core::error::ParleyError;
use crate::core::interpreter::Interpreter;
use crate::core::mode::{Mode, RequestContext};
use crate::core::overrides::{OverrideAdmin, OverrideSource, SqliteOverrideStore};
use crate::core::permission::{self, RuleScope};
use crate::core::principal::Principal;
use crate::core::prompt;
use crate::plugins::data_query;
use clap::Parser;
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

pub const PARLEY_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LOG_ENV_VAR: &str = "PARLEY_LOG";

/// Installs the stderr log subscriber. Only the binary calls this.
pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Walks up from `start_dir` looking for a `.parley` directory.
fn find_parley_project_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(config::CONFIG_DIR).is_dir() {
            return Some(current_dir);
        }
        if !current_dir.pop() {
            return None;
        }
    }
}

fn parse_principal(raw: &str) -> Result<Principal, ParleyError> {
    raw.parse()
}

fn parse_command(raw: &str) -> Result<CommandName, ParleyError> {
    CommandName::from_name(raw.trim()).ok_or_else(|| {
        ParleyError::ValidationError(format!(
            "unknown command '{}'; expected one of: {}",
            raw,
            CommandName::ALL.map(CommandName::as_str).join(", ")
        ))
    })
}

fn parse_format(raw: &str) -> Result<bool, ParleyError> {
    match raw {
        "text" => Ok(false),
        "json" => Ok(true),
        other => Err(ParleyError::ValidationError(format!(
            "unknown format '{other}'; expected 'text' or 'json'"
        ))),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ParleyError> {
    serde_json::to_string_pretty(value).map_err(|e| ParleyError::ValidationError(e.to_string()))
}

pub fn run() -> Result<(), ParleyError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;
    let project_root = find_parley_project_root(&current_dir).unwrap_or(current_dir);

    if let Command::Version = cli.command {
        println!("v{}", PARLEY_VERSION);
        return Ok(());
    }

    let config = config::load_config(&project_root, cli.config.as_deref())?;
    match cli.command {
        Command::Version => Ok(()),
        Command::Init => run_init(&config, &project_root),
        Command::Run(run_cli) => run_interpreter(&run_cli, &config, &project_root),
        Command::Prompt(prompt_cli) => {
            let mode: Mode = prompt_cli.mode.parse()?;
            let grammar = config.grammar()?;
            print!("{}", prompt::build_with(grammar, mode));
            Ok(())
        }
        Command::Matrix(matrix_cli) => print_matrix(&matrix_cli),
        Command::Override(override_cli) => {
            let overrides = SqliteOverrideStore::new(config.store(&project_root));
            run_override(override_cli.command, &overrides)
        }
        Command::Data(data_cli) => {
            let store = config.store(&project_root);
            match data_cli.command {
                DataCommand::RosterAdd {
                    name,
                    role,
                    address,
                    actor,
                } => {
                    let entry = data_query::add_roster_entry(&store, &name, &role, &address, &actor)?;
                    println!("{} {} ({})", "roster:".green(), entry.name, entry.role);
                }
                DataCommand::StatusSet {
                    component,
                    state,
                    detail,
                    actor,
                } => {
                    let entry = data_query::set_status(&store, &component, &state, &detail, &actor)?;
                    println!("{} {} = {}", "status:".green(), entry.component, entry.state);
                }
            }
            Ok(())
        }
    }
}

fn run_init(config: &ParleyConfig, project_root: &Path) -> Result<(), ParleyError> {
    std::fs::create_dir_all(project_root.join(config::CONFIG_DIR))?;
    let store = config.store(project_root);
    let initialized = subsystems::initialize_all_dbs(&store)?;
    println!(
        "{} store at {} ({})",
        "initialized".green().bold(),
        store.root.display(),
        initialized.join(", ")
    );
    Ok(())
}

fn run_interpreter(
    run_cli: &RunCli,
    config: &ParleyConfig,
    project_root: &Path,
) -> Result<(), ParleyError> {
    let principal = parse_principal(&run_cli.principal)?;
    let json = parse_format(&run_cli.format)?;
    let text = match &run_cli.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let context = RequestContext {
        request_mode: run_cli.mode.clone(),
        session_mode: run_cli.session_mode.clone(),
    };

    let interpreter = Interpreter::from_config(config, project_root)?;
    let transcript = interpreter.process(&text, principal, &context);
    if json {
        let report = serde_json::json!({
            "mode": transcript.mode(),
            "principal": transcript.principal(),
            "summary": transcript.summary(),
            "records": transcript.records(),
            "transcript": transcript.as_str(),
        });
        println!("{}", to_json(&report)?);
    } else {
        print!("{}", transcript);
    }
    Ok(())
}

fn print_matrix(matrix_cli: &MatrixCli) -> Result<(), ParleyError> {
    if parse_format(&matrix_cli.format)? {
        println!("{}", to_json(&permission::static_rules())?);
        return Ok(());
    }
    for rule_scope in Principal::ALL
        .into_iter()
        .map(RuleScope::Principal)
        .chain(Mode::ALL.into_iter().map(RuleScope::Mode))
    {
        let (kind, name, allowed): (&str, String, Vec<&str>) = match rule_scope {
            RuleScope::Principal(p) => (
                "principal",
                p.to_string(),
                CommandName::ALL
                    .into_iter()
                    .filter(|c| permission::principal_allows(p, *c))
                    .map(CommandName::as_str)
                    .collect(),
            ),
            RuleScope::Mode(m) => (
                "mode",
                m.to_string(),
                permission::commands_for_mode(m)
                    .into_iter()
                    .map(CommandName::as_str)
                    .collect(),
            ),
        };
        println!("{:<9} {:<16} {}", kind, name.bold(), allowed.join(" "));
    }
    Ok(())
}

fn run_override(command: OverrideCommand, overrides: &SqliteOverrideStore) -> Result<(), ParleyError> {
    match command {
        OverrideCommand::Set {
            principal,
            command,
            decision,
            actor,
        } => {
            let principal = parse_principal(&principal)?;
            let command = parse_command(&command)?;
            let allowed = match decision.as_str() {
                "allow" => true,
                "deny" => false,
                other => {
                    return Err(ParleyError::ValidationError(format!(
                        "unknown decision '{other}'; expected 'allow' or 'deny'"
                    )));
                }
            };
            let entry = overrides.set(principal, command, allowed, &actor)?;
            println!(
                "{} {} {} for {}",
                "override:".green(),
                if entry.allowed { "allow" } else { "deny" },
                entry.command,
                entry.principal
            );
        }
        OverrideCommand::Clear {
            principal,
            command,
            actor,
        } => {
            let principal = parse_principal(&principal)?;
            let command = parse_command(&command)?;
            if overrides.clear(principal, command, &actor)? {
                println!("{} {} for {}", "cleared:".green(), command, principal);
            } else {
                println!("no override for {} on {}", principal, command);
            }
        }
        OverrideCommand::List { format } => {
            let entries = overrides.load()?;
            if parse_format(&format)? {
                println!("{}", to_json(&entries)?);
            } else if entries.is_empty() {
                println!("no overrides");
            } else {
                for entry in entries {
                    let decision = if entry.allowed {
                        "allow".green()
                    } else {
                        "deny".red()
                    };
                    println!(
                        "{:<16} {:<16} {} (by {} at {})",
                        entry.principal, entry.command, decision, entry.actor, entry.ts
                    );
                }
            }
        }
    }
    Ok(())
}
