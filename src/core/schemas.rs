//! SQLite schema definitions for the interpreter's two databases.
//!
//! 1. overrides.db: administrative allow/deny overrides keyed by
//!    (principal, command). The only state that survives across passes.
//! 2. data.db: roster and component status tables read by the data-query
//!    capability.

// --- 1. Overrides ---
pub const OVERRIDES_DB_NAME: &str = "overrides.db";

pub const OVERRIDES_DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS overrides (
        principal TEXT NOT NULL,
        command TEXT NOT NULL,
        allowed INTEGER NOT NULL CHECK (allowed IN (0, 1)),
        actor TEXT NOT NULL,
        ts TEXT NOT NULL,
        override_id TEXT NOT NULL,
        PRIMARY KEY (principal, command)
    )
";

// --- 2. Data ---
pub const DATA_DB_NAME: &str = "data.db";

pub const DATA_DB_SCHEMA_ROSTER: &str = "
    CREATE TABLE IF NOT EXISTS roster (
        name TEXT PRIMARY KEY,
        role TEXT NOT NULL,
        address TEXT NOT NULL DEFAULT '',
        joined_at TEXT NOT NULL
    )
";
pub const DATA_DB_SCHEMA_STATUS: &str = "
    CREATE TABLE IF NOT EXISTS status (
        component TEXT PRIMARY KEY,
        state TEXT NOT NULL,
        detail TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL
    )
";
