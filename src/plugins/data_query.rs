//! Structured-data queries: the roster of known peers and component status.
//!
//! Passes read `data.db` through a read-only connection. Rows are written
//! only by the administrative helpers at the bottom of this file, which go
//! through the broker like every other store write.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::{CapabilityError, ParleyError};
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub role: String,
    pub address: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub component: String,
    pub state: String,
    pub detail: String,
    pub updated_at: String,
}

pub trait DataQuery: Send + Sync {
    fn list_roster(&self) -> Result<Vec<RosterEntry>, CapabilityError>;
    fn list_status(&self) -> Result<Vec<StatusEntry>, CapabilityError>;
}

#[derive(Debug, Clone)]
pub struct SqliteDataQuery {
    store: Store,
}

impl SqliteDataQuery {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn connect(&self) -> Result<Connection, CapabilityError> {
        let path = self.store.data_db_path();
        if !path.exists() {
            return Err(CapabilityError::Unavailable(
                "data store is not initialised (run `parley init`)".into(),
            ));
        }
        db::db_connect_read_only(&path).map_err(|e| match e {
            ParleyError::RusqliteError(err) => CapabilityError::Query(err),
            other => CapabilityError::Unavailable(other.to_string()),
        })
    }
}

impl DataQuery for SqliteDataQuery {
    fn list_roster(&self) -> Result<Vec<RosterEntry>, CapabilityError> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT name, role, address, joined_at FROM roster ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(RosterEntry {
                name: row.get(0)?,
                role: row.get(1)?,
                address: row.get(2)?,
                joined_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_status(&self) -> Result<Vec<StatusEntry>, CapabilityError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT component, state, detail, updated_at FROM status ORDER BY component",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StatusEntry {
                component: row.get(0)?,
                state: row.get(1)?,
                detail: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

pub fn render_roster(entries: &[RosterEntry]) -> String {
    if entries.is_empty() {
        return "(roster is empty)\n".to_string();
    }
    entries
        .iter()
        .map(|e| {
            if e.address.is_empty() {
                format!("{}\t{}\n", e.name, e.role)
            } else {
                format!("{}\t{}\t{}\n", e.name, e.role, e.address)
            }
        })
        .collect()
}

pub fn render_status(entries: &[StatusEntry]) -> String {
    if entries.is_empty() {
        return "(no components reported)\n".to_string();
    }
    entries
        .iter()
        .map(|e| {
            if e.detail.is_empty() {
                format!("{}: {}\n", e.component, e.state)
            } else {
                format!("{}: {} ({})\n", e.component, e.state, e.detail)
            }
        })
        .collect()
}

/// Inserts or updates a roster row.
pub fn add_roster_entry(
    store: &Store,
    name: &str,
    role: &str,
    address: &str,
    actor: &str,
) -> Result<RosterEntry, ParleyError> {
    if name.trim().is_empty() || role.trim().is_empty() {
        return Err(ParleyError::ValidationError(
            "roster entries need a name and a role".into(),
        ));
    }
    db::initialize_data_db(store)?;
    let entry = RosterEntry {
        name: name.to_string(),
        role: role.to_string(),
        address: address.to_string(),
        joined_at: time::now_epoch_z(),
    };
    let broker = DbBroker::new(store);
    broker.with_conn(&store.data_db_path(), actor, "data.roster.add", |conn| {
        conn.execute(
            "INSERT INTO roster(name, role, address, joined_at) VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET role = excluded.role, address = excluded.address",
            params![entry.name, entry.role, entry.address, entry.joined_at],
        )?;
        Ok(())
    })?;
    Ok(entry)
}

/// Records the current state of a component.
pub fn set_status(
    store: &Store,
    component: &str,
    state: &str,
    detail: &str,
    actor: &str,
) -> Result<StatusEntry, ParleyError> {
    if component.trim().is_empty() || state.trim().is_empty() {
        return Err(ParleyError::ValidationError(
            "status rows need a component and a state".into(),
        ));
    }
    db::initialize_data_db(store)?;
    let entry = StatusEntry {
        component: component.to_string(),
        state: state.to_string(),
        detail: detail.to_string(),
        updated_at: time::now_epoch_z(),
    };
    let broker = DbBroker::new(store);
    broker.with_conn(&store.data_db_path(), actor, "data.status.set", |conn| {
        conn.execute(
            "INSERT INTO status(component, state, detail, updated_at) VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(component) DO UPDATE SET
                state = excluded.state,
                detail = excluded.detail,
                updated_at = excluded.updated_at",
            params![entry.component, entry.state, entry.detail, entry.updated_at],
        )?;
        Ok(())
    })?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_roster_lines() {
        let text = render_roster(&[
            RosterEntry {
                name: "ada".into(),
                role: "admin".into(),
                address: "10.0.0.2".into(),
                joined_at: "1Z".into(),
            },
            RosterEntry {
                name: "bob".into(),
                role: "peer".into(),
                address: String::new(),
                joined_at: "2Z".into(),
            },
        ]);
        assert_eq!(text, "ada\tadmin\t10.0.0.2\nbob\tpeer\n");
        assert_eq!(render_roster(&[]), "(roster is empty)\n");
    }
}
