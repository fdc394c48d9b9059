//! Subsystem registration: every database `parley init` creates.
//!
//! Adding a new database: append one entry to `SUBSYSTEMS`.

use crate::core::db;
use crate::core::error::ParleyError;
use crate::core::store::Store;

pub(crate) struct SubsystemInit {
    pub name: &'static str,
    pub initialize_db: fn(&Store) -> Result<(), ParleyError>,
}

/// Initialised in order; sequential execution avoids SQLite contention.
pub(crate) const SUBSYSTEMS: &[SubsystemInit] = &[
    SubsystemInit {
        name: "overrides",
        initialize_db: db::initialize_overrides_db,
    },
    SubsystemInit {
        name: "data",
        initialize_db: db::initialize_data_db,
    },
];

/// Initialises every subsystem database and returns their names.
pub(crate) fn initialize_all_dbs(store: &Store) -> Result<Vec<&'static str>, ParleyError> {
    let mut done = Vec::with_capacity(SUBSYSTEMS.len());
    for sub in SUBSYSTEMS {
        (sub.initialize_db)(store)?;
        tracing::debug!(subsystem = sub.name, "database ready");
        done.push(sub.name);
    }
    Ok(done)
}
