//! Interpreter configuration, read from `.parley/parley.toml`.
//!
//! Every key is optional. A missing file means defaults; a file that does not
//! parse or fails validation is a `ConfigError`. Relative paths are resolved
//! against the project root the file belongs to.

use crate::core::error::ParleyError;
use crate::core::grammar::{DEFAULT_MARKER, Grammar};
use crate::core::store::Store;
use crate::plugins::fs::DEFAULT_BLOCKED_PATHS;
use crate::plugins::sandbox::{DEFAULT_OUTPUT_LIMIT_BYTES, SandboxTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR: &str = ".parley";
pub const CONFIG_FILE: &str = "parley.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParleyConfig {
    pub marker: char,
    pub handler_timeout_ms: u64,
    pub filesystem: FilesystemConfig,
    pub sandbox: SandboxConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesystemConfig {
    pub root: PathBuf,
    pub max_read_bytes: usize,
    pub max_search_results: usize,
    pub blocked_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    pub output_limit_bytes: usize,
    pub targets: BTreeMap<String, SandboxTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER,
            handler_timeout_ms: 30_000,
            filesystem: FilesystemConfig::default(),
            sandbox: SandboxConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            max_read_bytes: 1_000_000,
            max_search_results: 200,
            blocked_paths: DEFAULT_BLOCKED_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            targets: BTreeMap::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: Path::new(CONFIG_DIR).join("data"),
        }
    }
}

impl ParleyConfig {
    pub fn validate(&self) -> Result<(), ParleyError> {
        Grammar::new(self.marker)?;
        if self.handler_timeout_ms == 0 {
            return Err(ParleyError::ConfigError(
                "handler_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.filesystem.max_read_bytes == 0 || self.filesystem.max_search_results == 0 {
            return Err(ParleyError::ConfigError(
                "filesystem limits must be greater than zero".into(),
            ));
        }
        if self.sandbox.output_limit_bytes == 0 {
            return Err(ParleyError::ConfigError(
                "sandbox.output_limit_bytes must be greater than zero".into(),
            ));
        }
        for (name, target) in &self.sandbox.targets {
            if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ParleyError::ConfigError(format!(
                    "sandbox target name '{name}' must be a single word"
                )));
            }
            if target.launcher.first().is_some_and(|p| p.trim().is_empty()) {
                return Err(ParleyError::ConfigError(format!(
                    "sandbox target '{name}' has an empty launcher program"
                )));
            }
        }
        Ok(())
    }

    pub fn grammar(&self) -> Result<Grammar, ParleyError> {
        Grammar::new(self.marker)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn store(&self, project_root: &Path) -> Store {
        Store::new(resolve_path(project_root, &self.store.root))
    }

    pub fn filesystem_root(&self, project_root: &Path) -> PathBuf {
        resolve_path(project_root, &self.filesystem.root)
    }

    /// Targets with their workdirs made absolute.
    pub fn sandbox_targets(&self, project_root: &Path) -> BTreeMap<String, SandboxTarget> {
        self.sandbox
            .targets
            .iter()
            .map(|(name, target)| {
                (
                    name.clone(),
                    SandboxTarget {
                        workdir: resolve_path(project_root, &target.workdir),
                        launcher: target.launcher.clone(),
                    },
                )
            })
            .collect()
    }
}

fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

pub fn default_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Loads `explicit` if given (it must exist), otherwise the project's default
/// config file if present, otherwise defaults.
pub fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<ParleyConfig, ParleyError> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(ParleyError::ConfigError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path(project_root);
            if !path.exists() {
                return Ok(ParleyConfig::default());
            }
            path
        }
    };

    let content = fs::read_to_string(&path)?;
    let config: ParleyConfig = toml::from_str(&content)
        .map_err(|e| ParleyError::ConfigError(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ParleyConfig = toml::from_str(
            r#"
            marker = "!"

            [sandbox.targets.local]
            workdir = "work"
            "#,
        )
        .unwrap();
        assert_eq!(config.marker, '!');
        assert_eq!(config.handler_timeout_ms, 30_000);
        assert_eq!(config.filesystem.blocked_paths.len(), DEFAULT_BLOCKED_PATHS.len());
        let targets = config.sandbox_targets(Path::new("/proj"));
        assert_eq!(targets["local"].workdir, PathBuf::from("/proj/work"));
        assert!(targets["local"].launcher.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = ParleyConfig {
            handler_timeout_ms: 0,
            ..ParleyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ParleyError::ConfigError(_))));

        let err = toml::from_str::<ParleyConfig>("colour = \"blue\"").unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_store_root_default() {
        let config = ParleyConfig::default();
        assert_eq!(
            config.store(Path::new("/proj")).root,
            PathBuf::from("/proj/.parley/data")
        );
    }
}
