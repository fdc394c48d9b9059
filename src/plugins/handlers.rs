//! Capability handlers and the registry the dispatcher resolves them from.
//!
//! A handler turns one validated [`CommandRequest`] into output text or a
//! [`CapabilityError`]. Handlers are shared across worker threads, so they are
//! stored as `Arc<dyn CapabilityHandler>`.

use crate::core::command::{CommandName, CommandRequest, WriteMode};
use crate::core::error::CapabilityError;
use crate::plugins::data_query::{self, DataQuery};
use crate::plugins::fs::FileSystemAccess;
use crate::plugins::sandbox::{self, SandboxExec};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub trait CapabilityHandler: Send + Sync {
    fn execute(&self, request: &CommandRequest) -> Result<String, CapabilityError>;
}

fn wrong_request(handler: &str, request: &CommandRequest) -> CapabilityError {
    CapabilityError::InvalidArgument(format!("{handler} cannot serve {request:?}"))
}

/// `read-file`, `list-directory`, `search-files`.
pub struct FileReadHandler {
    fs: Arc<dyn FileSystemAccess>,
}

impl FileReadHandler {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }
}

impl CapabilityHandler for FileReadHandler {
    fn execute(&self, request: &CommandRequest) -> Result<String, CapabilityError> {
        match request {
            CommandRequest::ReadFile { path } => {
                let content = self.fs.read(path)?;
                let mut out = content.text;
                if content.truncated {
                    let shown = out.len();
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&format!(
                        "(truncated: showing {} of {} bytes)\n",
                        shown, content.size
                    ));
                }
                Ok(out)
            }
            CommandRequest::ListDirectory { path } => {
                let entries = self.fs.list(path)?;
                if entries.is_empty() {
                    return Ok("(empty directory)\n".to_string());
                }
                Ok(entries
                    .iter()
                    .map(|e| {
                        if e.is_dir {
                            format!("{}/\n", e.name)
                        } else {
                            format!("{}\n", e.name)
                        }
                    })
                    .collect())
            }
            CommandRequest::SearchFiles { pattern } => {
                let hits = self.fs.search(pattern)?;
                if hits.paths.is_empty() {
                    return Ok("(no matches)\n".to_string());
                }
                let mut out: String = hits.paths.iter().map(|p| format!("{p}\n")).collect();
                if hits.truncated {
                    out.push_str(&format!("(stopped after {} matches)\n", hits.paths.len()));
                }
                Ok(out)
            }
            other => Err(wrong_request("file-read handler", other)),
        }
    }
}

/// `create-file`, `replace-file`, `append-file`, `delete-file`.
pub struct FileWriteHandler {
    fs: Arc<dyn FileSystemAccess>,
}

impl FileWriteHandler {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }
}

impl CapabilityHandler for FileWriteHandler {
    fn execute(&self, request: &CommandRequest) -> Result<String, CapabilityError> {
        match request {
            CommandRequest::Write {
                path,
                content,
                mode,
            } => {
                let receipt = self.fs.write(path, content, *mode)?;
                let verb = match mode {
                    WriteMode::Create => "created",
                    WriteMode::Replace => "replaced",
                    WriteMode::Append => "appended to",
                };
                Ok(format!("{} {} ({} bytes)\n", verb, receipt.path, receipt.bytes))
            }
            CommandRequest::DeleteFile { path } => {
                self.fs.delete(path)?;
                Ok(format!("deleted {}\n", path.trim()))
            }
            other => Err(wrong_request("file-write handler", other)),
        }
    }
}

pub struct SandboxHandler {
    sandbox: Arc<dyn SandboxExec>,
}

impl SandboxHandler {
    pub fn new(sandbox: Arc<dyn SandboxExec>) -> Self {
        Self { sandbox }
    }
}

impl CapabilityHandler for SandboxHandler {
    fn execute(&self, request: &CommandRequest) -> Result<String, CapabilityError> {
        match request {
            CommandRequest::ExecInSandbox { target, command } => {
                let captured = self.sandbox.run(target, command)?;
                Ok(sandbox::render_captured(&captured))
            }
            other => Err(wrong_request("sandbox handler", other)),
        }
    }
}

/// `roster` and `status`.
pub struct DataQueryHandler {
    data: Arc<dyn DataQuery>,
}

impl DataQueryHandler {
    pub fn new(data: Arc<dyn DataQuery>) -> Self {
        Self { data }
    }
}

impl CapabilityHandler for DataQueryHandler {
    fn execute(&self, request: &CommandRequest) -> Result<String, CapabilityError> {
        match request {
            CommandRequest::Roster => Ok(data_query::render_roster(&self.data.list_roster()?)),
            CommandRequest::Status => Ok(data_query::render_status(&self.data.list_status()?)),
            other => Err(wrong_request("data-query handler", other)),
        }
    }
}

/// Command name to handler. Commands without an entry fail with a
/// `HandlerError` when dispatched.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<CommandName, Arc<dyn CapabilityHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires every command to the local adapters.
    pub fn with_capabilities(
        fs: Arc<dyn FileSystemAccess>,
        sandbox: Arc<dyn SandboxExec>,
        data: Arc<dyn DataQuery>,
    ) -> Self {
        let read: Arc<dyn CapabilityHandler> = Arc::new(FileReadHandler::new(fs.clone()));
        let write: Arc<dyn CapabilityHandler> = Arc::new(FileWriteHandler::new(fs));
        let exec: Arc<dyn CapabilityHandler> = Arc::new(SandboxHandler::new(sandbox));
        let query: Arc<dyn CapabilityHandler> = Arc::new(DataQueryHandler::new(data));

        let mut registry = Self::new();
        for command in CommandName::ALL {
            let handler = match command {
                CommandName::ReadFile | CommandName::ListDirectory | CommandName::SearchFiles => {
                    read.clone()
                }
                CommandName::Roster | CommandName::Status => query.clone(),
                CommandName::ExecInSandbox => exec.clone(),
                CommandName::CreateFile
                | CommandName::ReplaceFile
                | CommandName::AppendFile
                | CommandName::DeleteFile => write.clone(),
            };
            registry.register(command, handler);
        }
        registry
    }

    pub fn register(&mut self, command: CommandName, handler: Arc<dyn CapabilityHandler>) {
        self.handlers.insert(command, handler);
    }

    pub fn get(&self, command: CommandName) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.get(&command).cloned()
    }

    pub fn registered(&self) -> Vec<CommandName> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort();
        names
    }
}
