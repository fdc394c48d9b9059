//! Per-invocation dispatch: permission check, handler call, failure isolation.
//!
//! Every handler call runs on its own worker thread and is awaited for at
//! most the configured budget, so a hung or panicking capability becomes a
//! `HandlerError` for that one invocation and the pass moves on.

use crate::core::command::{CommandName, CommandRequest};
use crate::core::extractor::Candidate;
use crate::core::mode::Mode;
use crate::core::outcome::{ExecutionResult, FailureKind};
use crate::core::permission::PassPermissions;
use crate::core::principal::Principal;
use crate::plugins::handlers::HandlerRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Request-level cancellation flag, shared with whoever may abort the pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: HandlerRegistry,
    budget: Duration,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            budget: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.budget
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn dispatch(
        &self,
        candidate: &Candidate,
        principal: Principal,
        mode: Mode,
        permissions: &PassPermissions,
    ) -> ExecutionResult {
        let invocation = match candidate {
            Candidate::Malformed(bad) => {
                return ExecutionResult::failure(FailureKind::ParseError, bad.message.clone());
            }
            Candidate::Command(invocation) => invocation,
        };
        let command = invocation.command;

        let decision = permissions.evaluate(principal, mode, command);
        if !decision.allowed() {
            let message = decision.denial_message(principal, mode, command);
            tracing::warn!(
                command = %command,
                principal = %principal,
                mode = %mode,
                kind = "PermissionError",
                "invocation denied"
            );
            return ExecutionResult::failure(FailureKind::PermissionError, message);
        }

        let result = self.run_handler(command, invocation.request.clone());
        if let ExecutionResult::Failure { message, .. } = &result {
            tracing::warn!(
                command = %command,
                principal = %principal,
                mode = %mode,
                kind = "HandlerError",
                error = %message,
                "handler failed"
            );
        }
        result
    }

    fn run_handler(
        &self,
        command: CommandName,
        request: CommandRequest,
    ) -> ExecutionResult {
        let Some(handler) = self.registry.get(command) else {
            return ExecutionResult::failure(
                FailureKind::HandlerError,
                format!("no handler registered for '{}'", command),
            );
        };

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("parley-{}", command))
            .spawn(move || {
                let _ = tx.send(handler.execute(&request));
            });
        if let Err(err) = spawned {
            return ExecutionResult::failure(
                FailureKind::HandlerError,
                format!("could not start handler: {err}"),
            );
        }

        match rx.recv_timeout(self.budget) {
            Ok(Ok(output)) => ExecutionResult::success(output),
            Ok(Err(err)) => ExecutionResult::failure(FailureKind::HandlerError, err.to_string()),
            Err(RecvTimeoutError::Timeout) => ExecutionResult::failure(
                FailureKind::HandlerError,
                format!(
                    "timed out after {} ms; the operation may still complete",
                    self.budget.as_millis()
                ),
            ),
            Err(RecvTimeoutError::Disconnected) => {
                ExecutionResult::failure(FailureKind::HandlerError, "handler panicked")
            }
        }
    }
}
