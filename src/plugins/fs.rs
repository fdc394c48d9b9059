//! Filesystem capability: read, list, search, write and delete under a root.
//!
//! Every path is interpreted relative to the configured root. A leading `/`
//! means "the root", `..` may not climb above it, and symlinks that resolve
//! outside it are refused. Paths matching a blocked glob are invisible to
//! listing and search and refused for every operation.

use crate::core::command::WriteMode;
use crate::core::error::{CapabilityError, ParleyError};
use regex::Regex;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_BLOCKED_PATHS: &[&str] = &[".env", ".env.*", "**/.credentials", "**/secrets/**"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    pub text: String,
    /// Total size on disk; larger than `text` when truncated.
    pub size: u64,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHits {
    pub paths: Vec<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub path: String,
    pub bytes: usize,
    pub mode: WriteMode,
}

pub trait FileSystemAccess: Send + Sync {
    fn read(&self, path: &str) -> Result<FileContent, CapabilityError>;
    fn list(&self, path: &str) -> Result<Vec<DirEntry>, CapabilityError>;
    fn search(&self, pattern: &str) -> Result<SearchHits, CapabilityError>;
    fn write(&self, path: &str, content: &str, mode: WriteMode)
    -> Result<WriteReceipt, CapabilityError>;
    fn delete(&self, path: &str) -> Result<(), CapabilityError>;
}

/// Glob subset used for blocked paths and search: `**`, `*`, `?`.
///
/// A pattern without `/` is matched against each path component; one with `/`
/// against the whole root-relative path.
#[derive(Debug, Clone)]
pub struct PathGlob {
    regex: Regex,
    per_component: bool,
}

impl PathGlob {
    pub fn new(pattern: &str) -> Result<Self, CapabilityError> {
        let pattern = pattern.trim().trim_start_matches('/');
        if pattern.is_empty() {
            return Err(CapabilityError::InvalidArgument("empty glob pattern".into()));
        }
        let mut re = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                }
                '*' => re.push_str("[^/]*"),
                '?' => re.push_str("[^/]"),
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        re.push('$');
        let regex = Regex::new(&re)
            .map_err(|e| CapabilityError::InvalidArgument(format!("bad glob '{pattern}': {e}")))?;
        Ok(Self {
            regex,
            per_component: !pattern.contains('/'),
        })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if self.per_component {
            rel_path.split('/').any(|part| self.regex.is_match(part))
        } else {
            self.regex.is_match(rel_path)
        }
    }

    /// Search semantics: name-only patterns look at the file name.
    fn matches_file(&self, rel_path: &str) -> bool {
        if self.per_component {
            let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
            self.regex.is_match(name)
        } else {
            self.regex.is_match(rel_path)
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    blocked: Vec<PathGlob>,
    max_read_bytes: usize,
    max_search_results: usize,
}

impl LocalFileSystem {
    pub fn new(root: &Path) -> Result<Self, ParleyError> {
        let root = root.canonicalize().map_err(|e| {
            ParleyError::ConfigError(format!("filesystem root {}: {}", root.display(), e))
        })?;
        let blocked = DEFAULT_BLOCKED_PATHS
            .iter()
            .map(|p| PathGlob::new(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParleyError::ConfigError(e.to_string()))?;
        Ok(Self {
            root,
            blocked,
            max_read_bytes: 1_000_000,
            max_search_results: 200,
        })
    }

    pub fn with_blocked_paths(mut self, patterns: &[String]) -> Result<Self, ParleyError> {
        self.blocked = patterns
            .iter()
            .map(|p| PathGlob::new(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParleyError::ConfigError(e.to_string()))?;
        Ok(self)
    }

    pub fn with_limits(mut self, max_read_bytes: usize, max_search_results: usize) -> Self {
        self.max_read_bytes = max_read_bytes.max(1);
        self.max_search_results = max_search_results.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // The trailing-slash form lets `dir/**` patterns cover `dir` itself.
    fn is_blocked(&self, rel: &str) -> bool {
        let as_dir = format!("{rel}/");
        self.blocked
            .iter()
            .any(|glob| glob.matches(rel) || glob.matches(&as_dir))
    }

    /// Lexically resolves `raw` under the root, returning the absolute and
    /// root-relative forms.
    fn resolve(&self, raw: &str) -> Result<(PathBuf, String), CapabilityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CapabilityError::InvalidArgument("empty path".into()));
        }
        let mut parts: Vec<String> = Vec::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(CapabilityError::PathDenied(format!(
                            "{trimmed} escapes the workspace root"
                        )));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        let rel = if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        };
        if rel != "." && self.is_blocked(&rel) {
            return Err(CapabilityError::PathDenied(format!("{rel} is a protected path")));
        }
        let abs = parts.iter().fold(self.root.clone(), |acc, p| acc.join(p));
        self.confine(&abs, &rel)?;
        Ok((abs, rel))
    }

    /// Follows symlinks through the nearest existing ancestor of `abs` and
    /// checks the real location against the root and the blocked globs.
    fn confine(&self, abs: &Path, rel: &str) -> Result<(), CapabilityError> {
        let mut existing = abs.to_path_buf();
        let mut missing: Vec<OsString> = Vec::new();
        let canonical = loop {
            match existing.canonicalize() {
                Ok(canonical) => break canonical,
                Err(_) if fs::symlink_metadata(&existing).is_ok() => {
                    return Err(CapabilityError::PathDenied(format!(
                        "{rel} goes through a dangling link"
                    )));
                }
                Err(_) => {
                    let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
                        return Err(CapabilityError::PathDenied(format!(
                            "{rel} has no resolvable ancestor"
                        )));
                    };
                    missing.push(name.to_os_string());
                    existing = parent.to_path_buf();
                }
            }
        };
        let real = missing.iter().rev().fold(canonical, |acc, p| acc.join(p));
        let Some(real_rel) = self.relative(&real) else {
            return Err(CapabilityError::PathDenied(format!(
                "{rel} resolves outside the workspace root"
            )));
        };
        if !real_rel.is_empty() && self.is_blocked(&real_rel) {
            return Err(CapabilityError::PathDenied(format!(
                "{rel} resolves to a protected path"
            )));
        }
        Ok(())
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}

impl FileSystemAccess for LocalFileSystem {
    fn read(&self, path: &str) -> Result<FileContent, CapabilityError> {
        let (abs, rel) = self.resolve(path)?;
        let meta = fs::metadata(&abs).map_err(|e| CapabilityError::from_io(&rel, e))?;
        if !meta.is_file() {
            return Err(CapabilityError::InvalidArgument(format!("{rel} is not a regular file")));
        }
        let file = fs::File::open(&abs).map_err(|e| CapabilityError::from_io(&rel, e))?;
        let mut buf = Vec::new();
        file.take(self.max_read_bytes as u64)
            .read_to_end(&mut buf)
            .map_err(|e| CapabilityError::from_io(&rel, e))?;
        Ok(FileContent {
            text: String::from_utf8_lossy(&buf).to_string(),
            size: meta.len(),
            truncated: meta.len() > buf.len() as u64,
        })
    }

    fn list(&self, path: &str) -> Result<Vec<DirEntry>, CapabilityError> {
        let (abs, rel) = self.resolve(path)?;
        let reader = fs::read_dir(&abs).map_err(|e| CapabilityError::from_io(&rel, e))?;
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let child_rel = if rel == "." {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };
            if self.is_blocked(&child_rel) {
                continue;
            }
            let meta = entry.metadata()?;
            entries.push(DirEntry {
                name,
                is_dir: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn search(&self, pattern: &str) -> Result<SearchHits, CapabilityError> {
        let glob = PathGlob::new(pattern)?;
        let mut paths = Vec::new();
        let mut truncated = false;
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                self.relative(entry.path())
                    .is_none_or(|rel| rel.is_empty() || !self.is_blocked(&rel))
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry during search");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = self.relative(entry.path()) else {
                continue;
            };
            if glob.matches_file(&rel) {
                if paths.len() == self.max_search_results {
                    truncated = true;
                    break;
                }
                paths.push(rel);
            }
        }
        Ok(SearchHits { paths, truncated })
    }

    fn write(
        &self,
        path: &str,
        content: &str,
        mode: WriteMode,
    ) -> Result<WriteReceipt, CapabilityError> {
        let (abs, rel) = self.resolve(path)?;
        if rel == "." || abs.is_dir() {
            return Err(CapabilityError::InvalidArgument(format!("{rel} is a directory")));
        }
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|e| CapabilityError::from_io(&rel, e))?;
        }
        let mut options = OpenOptions::new();
        match mode {
            WriteMode::Create => options.write(true).create_new(true),
            WriteMode::Replace => {
                if !abs.is_file() {
                    return Err(CapabilityError::NotFound(rel));
                }
                options.write(true).truncate(true)
            }
            WriteMode::Append => options.append(true).create(true),
        };
        let mut file = options
            .open(&abs)
            .map_err(|e| CapabilityError::from_io(&rel, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| CapabilityError::from_io(&rel, e))?;
        Ok(WriteReceipt {
            path: rel,
            bytes: content.len(),
            mode,
        })
    }

    fn delete(&self, path: &str) -> Result<(), CapabilityError> {
        let (abs, rel) = self.resolve(path)?;
        let meta = fs::symlink_metadata(&abs).map_err(|e| CapabilityError::from_io(&rel, e))?;
        if meta.is_dir() {
            return Err(CapabilityError::InvalidArgument(format!(
                "{rel} is a directory; only files can be deleted"
            )));
        }
        fs::remove_file(&abs).map_err(|e| CapabilityError::from_io(&rel, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(PathGlob::new("*").unwrap().matches("foo"));
        assert!(PathGlob::new("*.rs").unwrap().matches_file("src/main.rs"));
        assert!(PathGlob::new("**/.credentials").unwrap().matches("foo/bar/.credentials"));
        assert!(PathGlob::new("**/.credentials").unwrap().matches(".credentials"));
        assert!(PathGlob::new("src/**").unwrap().matches("src/lib.rs"));
        assert!(PathGlob::new(".env.*").unwrap().matches("config/.env.local"));
        assert!(PathGlob::new("**/secrets/**").unwrap().matches("a/secrets/key.pem"));
        assert!(!PathGlob::new("src/*.rs").unwrap().matches("src/core/mod.rs"));
        assert!(PathGlob::new("data?.csv").unwrap().matches_file("data1.csv"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let glob = PathGlob::new("a+b(1).txt").unwrap();
        assert!(glob.matches_file("a+b(1).txt"));
        assert!(!glob.matches_file("aab1.txt"));
    }
}
