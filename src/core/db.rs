use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

pub fn db_connect(db_path: &Path) -> Result<Connection, error::ParleyError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    Ok(conn)
}

/// Read-only connection; missing databases are reported, not created.
pub fn db_connect_read_only(db_path: &Path) -> Result<Connection, error::ParleyError> {
    if !db_path.exists() {
        return Err(error::ParleyError::NotFound(db_path.display().to_string()));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

pub fn initialize_overrides_db(store: &Store) -> Result<(), error::ParleyError> {
    store.ensure()?;
    let broker = DbBroker::new(store);
    broker.with_conn(&store.overrides_db_path(), "parley", "overrides.init", |conn| {
        conn.execute(schemas::OVERRIDES_DB_SCHEMA, [])?;
        Ok(())
    })
}

pub fn initialize_data_db(store: &Store) -> Result<(), error::ParleyError> {
    store.ensure()?;
    let broker = DbBroker::new(store);
    broker.with_conn(&store.data_db_path(), "parley", "data.init", |conn| {
        conn.execute(schemas::DATA_DB_SCHEMA_ROSTER, [])?;
        conn.execute(schemas::DATA_DB_SCHEMA_STATUS, [])?;
        Ok(())
    })
}
