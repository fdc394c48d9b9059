//! Store handle for the interpreter's persistent state.
//!
//! A store is a directory holding `overrides.db`, `data.db` and the broker's
//! audit log. Nothing else is persisted: transcripts belong to the caller.

use crate::core::error::ParleyError;
use crate::core::schemas;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the store directory if it is missing.
    pub fn ensure(&self) -> Result<(), ParleyError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn overrides_db_path(&self) -> PathBuf {
        self.root.join(schemas::OVERRIDES_DB_NAME)
    }

    pub fn data_db_path(&self) -> PathBuf {
        self.root.join(schemas::DATA_DB_NAME)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join("broker.events.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}
