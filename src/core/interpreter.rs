//! One processing pass: resolve mode, extract, authorize and dispatch each
//! invocation in source order, assemble the transcript.

use crate::core::assembler::{self, InvocationRecord, Transcript};
use crate::core::config::ParleyConfig;
use crate::core::dispatcher::{CancelToken, Dispatcher};
use crate::core::error::ParleyError;
use crate::core::extractor::{Candidate, Extractor};
use crate::core::mode::{Mode, RequestContext, resolve_mode};
use crate::core::overrides::SqliteOverrideStore;
use crate::core::permission::{PassPermissions, PermissionMatrix};
use crate::core::principal::Principal;
use crate::plugins::data_query::SqliteDataQuery;
use crate::plugins::fs::LocalFileSystem;
use crate::plugins::handlers::HandlerRegistry;
use crate::plugins::sandbox::ProcessSandbox;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct Interpreter {
    extractor: Extractor,
    matrix: PermissionMatrix,
    dispatcher: Dispatcher,
}

impl Interpreter {
    pub fn new(extractor: Extractor, matrix: PermissionMatrix, dispatcher: Dispatcher) -> Self {
        Self {
            extractor,
            matrix,
            dispatcher,
        }
    }

    /// Wires the local adapters and the SQLite override store described by
    /// `config`.
    pub fn from_config(config: &ParleyConfig, project_root: &Path) -> Result<Self, ParleyError> {
        let store = config.store(project_root);
        let fs = LocalFileSystem::new(&config.filesystem_root(project_root))?
            .with_blocked_paths(&config.filesystem.blocked_paths)?
            .with_limits(
                config.filesystem.max_read_bytes,
                config.filesystem.max_search_results,
            );
        let sandbox = ProcessSandbox::new(config.sandbox_targets(project_root))
            .with_output_limit(config.sandbox.output_limit_bytes)
            .with_timeout(config.handler_timeout());
        let data = SqliteDataQuery::new(store.clone());

        let registry =
            HandlerRegistry::with_capabilities(Arc::new(fs), Arc::new(sandbox), Arc::new(data));
        Ok(Self::new(
            Extractor::new(config.grammar()?),
            PermissionMatrix::new(Arc::new(SqliteOverrideStore::new(store))),
            Dispatcher::new(registry).with_timeout(config.handler_timeout()),
        ))
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn process(&self, text: &str, principal: Principal, context: &RequestContext) -> Transcript {
        self.process_in_mode(text, principal, resolve_mode(context))
    }

    pub fn process_in_mode(&self, text: &str, principal: Principal, mode: Mode) -> Transcript {
        let candidates = self.extractor.extract(text);
        let permissions = self.permissions_for(&candidates);
        let records = candidates
            .into_iter()
            .map(|candidate| self.dispatch_one(candidate, principal, mode, &permissions))
            .collect();
        self.finish(text, records, mode, principal)
    }

    /// Like [`Interpreter::process`], but checks `cancel` before each
    /// invocation and abandons the rest of the pass once it is set.
    pub fn process_with_cancel(
        &self,
        text: &str,
        principal: Principal,
        context: &RequestContext,
        cancel: &CancelToken,
    ) -> Result<Transcript, ParleyError> {
        let mode = resolve_mode(context);
        let candidates = self.extractor.extract(text);
        let permissions = self.permissions_for(&candidates);
        let mut records = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if cancel.is_cancelled() {
                tracing::info!(completed = records.len(), "pass cancelled");
                return Err(ParleyError::Cancelled {
                    completed: records.len(),
                });
            }
            records.push(self.dispatch_one(candidate, principal, mode, &permissions));
        }
        Ok(self.finish(text, records, mode, principal))
    }

    // Plain text never touches the override store.
    fn permissions_for(&self, candidates: &[Candidate]) -> PassPermissions {
        if candidates.is_empty() {
            PassPermissions::from_snapshot(Default::default())
        } else {
            self.matrix.begin_pass()
        }
    }

    fn dispatch_one(
        &self,
        candidate: Candidate,
        principal: Principal,
        mode: Mode,
        permissions: &PassPermissions,
    ) -> InvocationRecord {
        let result = self
            .dispatcher
            .dispatch(&candidate, principal, mode, permissions);
        InvocationRecord { candidate, result }
    }

    fn finish(
        &self,
        text: &str,
        records: Vec<InvocationRecord>,
        mode: Mode,
        principal: Principal,
    ) -> Transcript {
        let transcript = assembler::assemble(text, records, mode, principal);
        let summary = transcript.summary();
        if summary.total > 0 {
            tracing::info!(
                principal = %principal,
                mode = %mode,
                total = summary.total,
                ok = summary.succeeded,
                parse_errors = summary.parse_errors,
                permission_errors = summary.permission_errors,
                handler_errors = summary.handler_errors,
                "pass complete"
            );
        }
        transcript
    }
}
