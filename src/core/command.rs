//! The closed command vocabulary and typed argument parsing.
//!
//! Every command has a fixed shape (inline or block) and a category. Argument
//! text is checked here, at extraction time, so a malformed argument line is a
//! `ParseError` and never reaches a handler.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandName {
    ReadFile,
    ListDirectory,
    SearchFiles,
    Roster,
    Status,
    ExecInSandbox,
    CreateFile,
    ReplaceFile,
    AppendFile,
    DeleteFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    /// Name plus a single line of arguments.
    Inline,
    /// Name, path argument and a delimited multi-line body.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Read,
    Exec,
    Write,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Read => "read",
            Category::Exec => "exec",
            Category::Write => "write",
        }
    }
}

impl CommandName {
    pub const ALL: [CommandName; 10] = [
        CommandName::ReadFile,
        CommandName::ListDirectory,
        CommandName::SearchFiles,
        CommandName::Roster,
        CommandName::Status,
        CommandName::ExecInSandbox,
        CommandName::CreateFile,
        CommandName::ReplaceFile,
        CommandName::AppendFile,
        CommandName::DeleteFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::ReadFile => "read-file",
            CommandName::ListDirectory => "list-directory",
            CommandName::SearchFiles => "search-files",
            CommandName::Roster => "roster",
            CommandName::Status => "status",
            CommandName::ExecInSandbox => "exec-in-sandbox",
            CommandName::CreateFile => "create-file",
            CommandName::ReplaceFile => "replace-file",
            CommandName::AppendFile => "append-file",
            CommandName::DeleteFile => "delete-file",
        }
    }

    pub fn from_name(name: &str) -> Option<CommandName> {
        CommandName::ALL.into_iter().find(|c| c.as_str() == name)
    }

    pub fn shape(self) -> CommandShape {
        match self {
            CommandName::CreateFile | CommandName::ReplaceFile | CommandName::AppendFile => {
                CommandShape::Block
            }
            CommandName::ReadFile
            | CommandName::ListDirectory
            | CommandName::SearchFiles
            | CommandName::Roster
            | CommandName::Status
            | CommandName::ExecInSandbox
            | CommandName::DeleteFile => CommandShape::Inline,
        }
    }

    pub fn category(self) -> Category {
        match self {
            CommandName::ReadFile
            | CommandName::ListDirectory
            | CommandName::SearchFiles
            | CommandName::Roster
            | CommandName::Status => Category::Read,
            CommandName::ExecInSandbox => Category::Exec,
            CommandName::CreateFile
            | CommandName::ReplaceFile
            | CommandName::AppendFile
            | CommandName::DeleteFile => Category::Write,
        }
    }

    /// Argument synopsis shown to the assistant, without the marker.
    pub fn synopsis(self) -> &'static str {
        match self {
            CommandName::ReadFile => "read-file <path>",
            CommandName::ListDirectory => "list-directory [path]",
            CommandName::SearchFiles => "search-files <glob-pattern>",
            CommandName::Roster => "roster",
            CommandName::Status => "status",
            CommandName::ExecInSandbox => "exec-in-sandbox <target> <command text>",
            CommandName::CreateFile => "create-file <path> <<<",
            CommandName::ReplaceFile => "replace-file <path> <<<",
            CommandName::AppendFile => "append-file <path> <<<",
            CommandName::DeleteFile => "delete-file <path>",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            CommandName::ReadFile => "print the contents of a file",
            CommandName::ListDirectory => "list the entries of a directory (defaults to the root)",
            CommandName::SearchFiles => "find files whose name or path matches a glob",
            CommandName::Roster => "show the roster of known peers",
            CommandName::Status => "show component status",
            CommandName::ExecInSandbox => "run a shell command inside a named sandbox target",
            CommandName::CreateFile => "create a new file with the body as content",
            CommandName::ReplaceFile => "overwrite an existing file with the body",
            CommandName::AppendFile => "append the body to a file, creating it if needed",
            CommandName::DeleteFile => "delete a file",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a write lands on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Fails if the file exists.
    Create,
    /// Fails if the file does not exist.
    Replace,
    /// Creates the file when absent.
    Append,
}

/// Fully validated arguments for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum CommandRequest {
    ReadFile { path: String },
    ListDirectory { path: String },
    SearchFiles { pattern: String },
    Roster,
    Status,
    ExecInSandbox { target: String, command: String },
    Write { path: String, content: String, mode: WriteMode },
    DeleteFile { path: String },
}

impl CommandRequest {
    /// Validates `argument_text` (and `body` for block commands) for `command`.
    pub fn parse(
        command: CommandName,
        argument_text: &str,
        body: Option<&str>,
    ) -> Result<CommandRequest, String> {
        match command {
            CommandName::ReadFile => Ok(CommandRequest::ReadFile {
                path: single_value(command, argument_text, "path", true)?.unwrap_or_default(),
            }),
            CommandName::ListDirectory => Ok(CommandRequest::ListDirectory {
                path: single_value(command, argument_text, "path", false)?
                    .unwrap_or_else(|| ".".to_string()),
            }),
            CommandName::SearchFiles => Ok(CommandRequest::SearchFiles {
                pattern: single_value(command, argument_text, "pattern", true)?.unwrap_or_default(),
            }),
            CommandName::Roster => no_arguments(command, argument_text).map(|_| CommandRequest::Roster),
            CommandName::Status => no_arguments(command, argument_text).map(|_| CommandRequest::Status),
            CommandName::ExecInSandbox => parse_exec(argument_text),
            CommandName::DeleteFile => Ok(CommandRequest::DeleteFile {
                path: single_value(command, argument_text, "path", true)?.unwrap_or_default(),
            }),
            CommandName::CreateFile | CommandName::ReplaceFile | CommandName::AppendFile => {
                let path = single_value(command, argument_text, "path", true)?.unwrap_or_default();
                let content = body
                    .ok_or_else(|| format!("{} requires a delimited body", command))?
                    .to_string();
                let mode = match command {
                    CommandName::CreateFile => WriteMode::Create,
                    CommandName::ReplaceFile => WriteMode::Replace,
                    _ => WriteMode::Append,
                };
                Ok(CommandRequest::Write { path, content, mode })
            }
        }
    }
}

/// Accepts `key=value` or one positional token. Anything beyond one value is
/// rejected rather than silently dropped.
fn single_value(
    command: CommandName,
    argument_text: &str,
    key: &str,
    required: bool,
) -> Result<Option<String>, String> {
    let tokens = shlex::split(argument_text)
        .ok_or_else(|| format!("{}: unbalanced quotes in arguments", command))?;
    let prefix = format!("{key}=");
    let mut value: Option<String> = None;
    for token in tokens {
        let candidate = token
            .strip_prefix(&prefix)
            .map(str::to_string)
            .unwrap_or(token);
        if value.is_some() {
            return Err(format!("{}: unexpected argument '{}'", command, candidate));
        }
        value = Some(candidate);
    }
    match value {
        Some(v) if v.trim().is_empty() => Err(format!("{}: {} cannot be empty", command, key)),
        Some(v) => Ok(Some(v)),
        None if required => Err(format!("{}: missing {}", command, key)),
        None => Ok(None),
    }
}

fn no_arguments(command: CommandName, argument_text: &str) -> Result<(), String> {
    let trimmed = argument_text.trim();
    if trimmed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} takes no arguments (got '{}')", command, trimmed))
    }
}

fn parse_exec(argument_text: &str) -> Result<CommandRequest, String> {
    let trimmed = argument_text.trim();
    let (target, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((target, rest)) => (target, rest.trim()),
        None => (trimmed, ""),
    };
    let target = target.strip_prefix("target=").unwrap_or(target);
    if target.is_empty() {
        return Err("exec-in-sandbox: missing target".to_string());
    }
    if rest.is_empty() {
        return Err(format!("exec-in-sandbox: missing command text for target '{target}'"));
    }
    Ok(CommandRequest::ExecInSandbox {
        target: target.to_string(),
        command: rest.to_string(),
    })
}
