//! Persisted allow/deny overrides for the permission matrix.
//!
//! Reading and writing are separate traits: the matrix only ever sees an
//! [`OverrideSource`], while [`OverrideAdmin`] is handed to administrative
//! flows (the `parley override` CLI). Callers are responsible for serialising
//! admin writes; the SQLite implementation does so through the broker.

use crate::core::broker::DbBroker;
use crate::core::command::CommandName;
use crate::core::db;
use crate::core::error::ParleyError;
use crate::core::principal::Principal;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::params;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub principal: Principal,
    pub command: CommandName,
    pub allowed: bool,
    pub actor: String,
    pub ts: String,
}

/// Read side, injected into the permission matrix.
pub trait OverrideSource: Send + Sync {
    fn load(&self) -> Result<Vec<OverrideEntry>, ParleyError>;
}

/// Write side, used only by administrative flows.
pub trait OverrideAdmin: Send + Sync {
    fn set(
        &self,
        principal: Principal,
        command: CommandName,
        allowed: bool,
        actor: &str,
    ) -> Result<OverrideEntry, ParleyError>;

    /// Returns whether an entry was removed.
    fn clear(&self, principal: Principal, command: CommandName, actor: &str)
    -> Result<bool, ParleyError>;
}

/// Overrides as read at the start of one pass.
#[derive(Debug, Clone, Default)]
pub struct OverrideSnapshot {
    rules: FxHashMap<(Principal, CommandName), bool>,
}

impl OverrideSnapshot {
    pub fn from_entries(entries: impl IntoIterator<Item = OverrideEntry>) -> Self {
        Self {
            rules: entries
                .into_iter()
                .map(|e| ((e.principal, e.command), e.allowed))
                .collect(),
        }
    }

    pub fn get(&self, principal: Principal, command: CommandName) -> Option<bool> {
        self.rules.get(&(principal, command)).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// SQLite-backed store living in `overrides.db`.
#[derive(Debug, Clone)]
pub struct SqliteOverrideStore {
    store: Store,
}

impl SqliteOverrideStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl OverrideSource for SqliteOverrideStore {
    fn load(&self) -> Result<Vec<OverrideEntry>, ParleyError> {
        let path = self.store.overrides_db_path();
        if !path.exists() {
            // Nothing was ever written: the static tables apply unchanged.
            return Ok(Vec::new());
        }
        let conn = db::db_connect_read_only(&path)?;
        let mut stmt = conn.prepare(
            "SELECT principal, command, allowed, actor, ts FROM overrides ORDER BY principal, command",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (principal, command, allowed, actor, ts) = row?;
            let (Some(p), Some(c)) = (Principal::parse(&principal), CommandName::from_name(&command))
            else {
                tracing::warn!(
                    principal = %principal,
                    command = %command,
                    "ignoring override for unknown principal or command"
                );
                continue;
            };
            out.push(OverrideEntry {
                principal: p,
                command: c,
                allowed: allowed != 0,
                actor,
                ts,
            });
        }
        Ok(out)
    }
}

impl OverrideAdmin for SqliteOverrideStore {
    fn set(
        &self,
        principal: Principal,
        command: CommandName,
        allowed: bool,
        actor: &str,
    ) -> Result<OverrideEntry, ParleyError> {
        db::initialize_overrides_db(&self.store)?;
        let broker = DbBroker::new(&self.store);
        let ts = time::now_epoch_z();
        broker.with_conn(&self.store.overrides_db_path(), actor, "overrides.set", |conn| {
            conn.execute(
                "INSERT INTO overrides(principal, command, allowed, actor, ts, override_id)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(principal, command) DO UPDATE SET
                    allowed = excluded.allowed,
                    actor = excluded.actor,
                    ts = excluded.ts,
                    override_id = excluded.override_id",
                params![
                    principal.as_str(),
                    command.as_str(),
                    allowed as i64,
                    actor,
                    ts,
                    time::new_event_id()
                ],
            )?;
            Ok(())
        })?;
        Ok(OverrideEntry {
            principal,
            command,
            allowed,
            actor: actor.to_string(),
            ts,
        })
    }

    fn clear(
        &self,
        principal: Principal,
        command: CommandName,
        actor: &str,
    ) -> Result<bool, ParleyError> {
        db::initialize_overrides_db(&self.store)?;
        let broker = DbBroker::new(&self.store);
        broker.with_conn(&self.store.overrides_db_path(), actor, "overrides.clear", |conn| {
            let removed = conn.execute(
                "DELETE FROM overrides WHERE principal = ?1 AND command = ?2",
                params![principal.as_str(), command.as_str()],
            )?;
            Ok(removed > 0)
        })
    }
}

/// In-process store for tests and embedders without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryOverrideStore {
    entries: Arc<RwLock<Vec<OverrideEntry>>>,
}

impl MemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverrideSource for MemoryOverrideStore {
    fn load(&self) -> Result<Vec<OverrideEntry>, ParleyError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ParleyError::ValidationError("override store lock poisoned".into()))?;
        Ok(entries.clone())
    }
}

impl OverrideAdmin for MemoryOverrideStore {
    fn set(
        &self,
        principal: Principal,
        command: CommandName,
        allowed: bool,
        actor: &str,
    ) -> Result<OverrideEntry, ParleyError> {
        let entry = OverrideEntry {
            principal,
            command,
            allowed,
            actor: actor.to_string(),
            ts: time::now_epoch_z(),
        };
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParleyError::ValidationError("override store lock poisoned".into()))?;
        entries.retain(|e| !(e.principal == principal && e.command == command));
        entries.push(entry.clone());
        Ok(entry)
    }

    fn clear(
        &self,
        principal: Principal,
        command: CommandName,
        _actor: &str,
    ) -> Result<bool, ParleyError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParleyError::ValidationError("override store lock poisoned".into()))?;
        let before = entries.len();
        entries.retain(|e| !(e.principal == principal && e.command == command));
        Ok(entries.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_upserts() {
        let store = MemoryOverrideStore::new();
        store
            .set(Principal::Assistant, CommandName::DeleteFile, true, "op")
            .unwrap();
        store
            .set(Principal::Assistant, CommandName::DeleteFile, false, "op")
            .unwrap();
        let snapshot = OverrideSnapshot::from_entries(store.load().unwrap());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(Principal::Assistant, CommandName::DeleteFile),
            Some(false)
        );
        assert!(store
            .clear(Principal::Assistant, CommandName::DeleteFile, "op")
            .unwrap());
        assert!(store.load().unwrap().is_empty());
    }
}
