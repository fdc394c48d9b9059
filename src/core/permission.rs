//! The principal x mode permission matrix.
//!
//! Evaluation order for one `(principal, mode, command)`:
//! 1. an override for `(principal, command)` wins outright;
//! 2. otherwise the static principal table and the static mode table must
//!    both allow it.
//!
//! Both static tables are exhaustive matches, so adding a command or a scope
//! does not compile until every pair has an explicit rule.

use crate::core::command::{Category, CommandName};
use crate::core::mode::Mode;
use crate::core::overrides::{MemoryOverrideStore, OverrideSnapshot, OverrideSource};
use crate::core::principal::Principal;
use serde::Serialize;
use std::sync::Arc;

/// Commands a principal may intrinsically request, independent of mode.
pub fn principal_allows(principal: Principal, command: CommandName) -> bool {
    use CommandName::*;
    match (principal, command) {
        (
            Principal::HumanAdmin,
            ReadFile | ListDirectory | SearchFiles | Roster | Status | ExecInSandbox | CreateFile
            | ReplaceFile | AppendFile | DeleteFile,
        ) => true,

        (Principal::Assistant, DeleteFile) => false,
        (
            Principal::Assistant,
            ReadFile | ListDirectory | SearchFiles | Roster | Status | ExecInSandbox | CreateFile
            | ReplaceFile | AppendFile,
        ) => true,

        (
            Principal::BackgroundAgent,
            ReadFile | ListDirectory | SearchFiles | Roster | Status | AppendFile,
        ) => true,
        (Principal::BackgroundAgent, ExecInSandbox | CreateFile | ReplaceFile | DeleteFile) => {
            false
        }

        (Principal::System, Roster | Status) => true,
        (
            Principal::System,
            ReadFile | ListDirectory | SearchFiles | ExecInSandbox | CreateFile | ReplaceFile
            | AppendFile | DeleteFile,
        ) => false,
    }
}

/// Command categories reachable in a mode.
pub fn mode_allows(mode: Mode, command: CommandName) -> bool {
    match (mode, command.category()) {
        (Mode::ChatOnly, Category::Read) => true,
        (Mode::ChatOnly, Category::Exec | Category::Write) => false,
        (Mode::Hybrid, Category::Read | Category::Exec) => true,
        (Mode::Hybrid, Category::Write) => false,
        (Mode::Autonomous, Category::Read | Category::Exec | Category::Write) => true,
    }
}

/// Commands the mode table permits, in declaration order.
pub fn commands_for_mode(mode: Mode) -> Vec<CommandName> {
    CommandName::ALL
        .into_iter()
        .filter(|command| mode_allows(mode, *command))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "value", rename_all = "snake_case")]
pub enum RuleScope {
    Principal(Principal),
    Mode(Mode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionRule {
    pub scope: RuleScope,
    pub command: CommandName,
    pub allowed: bool,
}

/// Every static rule, principal scopes first.
pub fn static_rules() -> Vec<PermissionRule> {
    let principal_rules = Principal::ALL.into_iter().flat_map(|principal| {
        CommandName::ALL.into_iter().map(move |command| PermissionRule {
            scope: RuleScope::Principal(principal),
            command,
            allowed: principal_allows(principal, command),
        })
    });
    let mode_rules = Mode::ALL.into_iter().flat_map(|mode| {
        CommandName::ALL.into_iter().map(move |command| PermissionRule {
            scope: RuleScope::Mode(mode),
            command,
            allowed: mode_allows(mode, command),
        })
    });
    principal_rules.chain(mode_rules).collect()
}

/// Outcome of one evaluation with the reason attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Override { allowed: bool },
    Static { by_principal: bool, by_mode: bool },
    /// The override store could not be read; everything is denied.
    StoreUnavailable { reason: String },
}

impl Decision {
    pub fn allowed(&self) -> bool {
        match self {
            Decision::Override { allowed } => *allowed,
            Decision::Static {
                by_principal,
                by_mode,
            } => *by_principal && *by_mode,
            Decision::StoreUnavailable { .. } => false,
        }
    }

    /// Human-readable reason for a denial.
    pub fn denial_message(&self, principal: Principal, mode: Mode, command: CommandName) -> String {
        match self {
            Decision::Override { .. } => format!(
                "command '{}' is denied for principal '{}' in mode '{}' by an administrative override",
                command, principal, mode
            ),
            Decision::Static {
                by_principal,
                by_mode,
            } => match (*by_principal, *by_mode) {
                (true, false) => format!(
                    "command '{}' is not permitted in mode '{}'",
                    command, mode
                ),
                (false, true) => format!(
                    "command '{}' is not permitted for principal '{}' in mode '{}'",
                    command, principal, mode
                ),
                _ => format!(
                    "command '{}' is not permitted for principal '{}' in mode '{}'",
                    command, principal, mode
                ),
            },
            Decision::StoreUnavailable { reason } => format!(
                "command '{}' denied in mode '{}': permission overrides unavailable ({})",
                command, mode, reason
            ),
        }
    }
}

/// The matrix itself. Holds the injected override source and snapshots it
/// once per pass.
#[derive(Clone)]
pub struct PermissionMatrix {
    overrides: Arc<dyn OverrideSource>,
}

impl PermissionMatrix {
    pub fn new(overrides: Arc<dyn OverrideSource>) -> Self {
        Self { overrides }
    }

    /// Matrix with no overrides at all.
    pub fn static_only() -> Self {
        Self::new(Arc::new(MemoryOverrideStore::new()))
    }

    /// Reads the override store for a new pass. A read failure fails closed.
    pub fn begin_pass(&self) -> PassPermissions {
        match self.overrides.load() {
            Ok(entries) => PassPermissions {
                overrides: Ok(OverrideSnapshot::from_entries(entries)),
            },
            Err(err) => {
                tracing::warn!(error = %err, "override store unreadable; denying all commands this pass");
                PassPermissions {
                    overrides: Err(err.to_string()),
                }
            }
        }
    }

    /// Convenience one-shot check; reads the store on every call.
    pub fn authorize(&self, principal: Principal, mode: Mode, command: CommandName) -> bool {
        self.begin_pass().authorize(principal, mode, command)
    }
}

/// Permissions frozen for a single pass.
#[derive(Debug, Clone)]
pub struct PassPermissions {
    overrides: Result<OverrideSnapshot, String>,
}

impl PassPermissions {
    pub fn from_snapshot(snapshot: OverrideSnapshot) -> Self {
        Self {
            overrides: Ok(snapshot),
        }
    }

    pub fn evaluate(&self, principal: Principal, mode: Mode, command: CommandName) -> Decision {
        let snapshot = match &self.overrides {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                return Decision::StoreUnavailable {
                    reason: reason.clone(),
                };
            }
        };
        if let Some(allowed) = snapshot.get(principal, command) {
            return Decision::Override { allowed };
        }
        Decision::Static {
            by_principal: principal_allows(principal, command),
            by_mode: mode_allows(mode, command),
        }
    }

    pub fn authorize(&self, principal: Principal, mode: Mode, command: CommandName) -> bool {
        self.evaluate(principal, mode, command).allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overrides::OverrideEntry;

    fn entry(principal: Principal, command: CommandName, allowed: bool) -> OverrideEntry {
        OverrideEntry {
            principal,
            command,
            allowed,
            actor: "test".to_string(),
            ts: "0Z".to_string(),
        }
    }

    #[test]
    fn test_static_rules_cover_every_pair() {
        let rules = static_rules();
        assert_eq!(
            rules.len(),
            (Principal::ALL.len() + Mode::ALL.len()) * CommandName::ALL.len()
        );
    }

    #[test]
    fn test_mode_tiers_nest() {
        for command in CommandName::ALL {
            if mode_allows(Mode::ChatOnly, command) {
                assert!(mode_allows(Mode::Hybrid, command));
            }
            if mode_allows(Mode::Hybrid, command) {
                assert!(mode_allows(Mode::Autonomous, command));
            }
        }
        assert!(!mode_allows(Mode::ChatOnly, CommandName::ExecInSandbox));
        assert!(!mode_allows(Mode::Hybrid, CommandName::CreateFile));
    }

    #[test]
    fn test_both_tables_must_allow() {
        let perms = PassPermissions::from_snapshot(OverrideSnapshot::default());
        // principal yes, mode no
        assert!(!perms.authorize(Principal::HumanAdmin, Mode::ChatOnly, CommandName::CreateFile));
        // mode yes, principal no
        assert!(!perms.authorize(Principal::Assistant, Mode::Autonomous, CommandName::DeleteFile));
        assert!(perms.authorize(Principal::Assistant, Mode::Hybrid, CommandName::ExecInSandbox));
    }

    #[test]
    fn test_override_wins_both_ways() {
        let snapshot = OverrideSnapshot::from_entries([
            entry(Principal::Assistant, CommandName::DeleteFile, true),
            entry(Principal::Assistant, CommandName::ReadFile, false),
        ]);
        let perms = PassPermissions::from_snapshot(snapshot);
        assert_eq!(
            perms.evaluate(Principal::Assistant, Mode::ChatOnly, CommandName::DeleteFile),
            Decision::Override { allowed: true }
        );
        assert!(!perms.authorize(Principal::Assistant, Mode::Autonomous, CommandName::ReadFile));
    }

    #[test]
    fn test_denial_message_cites_mode() {
        let perms = PassPermissions::from_snapshot(OverrideSnapshot::default());
        let decision = perms.evaluate(Principal::Assistant, Mode::ChatOnly, CommandName::CreateFile);
        let msg = decision.denial_message(Principal::Assistant, Mode::ChatOnly, CommandName::CreateFile);
        assert!(msg.contains("mode 'chat-only'"), "{msg}");
    }

    #[test]
    fn test_every_denial_names_command_and_mode() {
        let decisions = [
            Decision::Override { allowed: false },
            Decision::Static { by_principal: false, by_mode: true },
            Decision::Static { by_principal: true, by_mode: false },
            Decision::Static { by_principal: false, by_mode: false },
            Decision::StoreUnavailable { reason: "disk I/O error".to_string() },
        ];
        for decision in decisions {
            let msg = decision.denial_message(Principal::System, Mode::Hybrid, CommandName::DeleteFile);
            assert!(msg.contains("'delete-file'"), "{msg}");
            assert!(msg.contains("mode 'hybrid'"), "{msg}");
        }
    }
}
