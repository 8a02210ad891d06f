//! Template Store - transient storage for uploaded templates and presets
//!
//! Uploaded files are kept under one subdirectory per purpose of the
//! configured temp root. Each directory keeps only its most recently
//! modified entries; the cap is enforced whenever the directory is accessed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::api::logs::log_warning;
use crate::config::{Config, DEFAULT_RETENTION};
use crate::error::StoreError;

/// Store subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Templates,
    Presets,
}

impl StoreKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Templates => "templates",
            Self::Presets => "presets",
        }
    }
}

/// A stored file with metadata
#[derive(Debug, Clone, Serialize)]
pub struct StoredTemplate {
    /// File name inside the store directory
    pub name: String,
    /// Absolute path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

/// Directory-backed store with a per-directory retention cap
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
    retention: usize,
}

impl TemplateStore {
    /// Create a store rooted at `root` keeping `retention` entries per directory
    pub fn new(root: impl AsRef<Path>, retention: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            retention: retention.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.temp_root, config.retention)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a kind, created on demand
    pub fn dir(&self, kind: StoreKind) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(kind.dir_name());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write an uploaded file; an existing entry with the same name is replaced
    pub fn save(&self, kind: StoreKind, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let name = checked_name(name)?;
        let path = self.dir(kind)?.join(name);
        fs::write(&path, bytes)?;
        self.enforce_retention(kind)?;
        Ok(path)
    }

    /// Stored entries, newest first
    pub fn list(&self, kind: StoreKind) -> Result<Vec<StoredTemplate>, StoreError> {
        self.enforce_retention(kind)?;
        self.scan(kind)
    }

    /// Path of a stored entry
    pub fn get(&self, kind: StoreKind, name: &str) -> Result<PathBuf, StoreError> {
        let name = checked_name(name)?;
        self.enforce_retention(kind)?;
        let path = self.dir(kind)?.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::NotFound(name.to_string()))
        }
    }

    /// Delete the oldest entries beyond the cap; returns the evicted names
    pub fn enforce_retention(&self, kind: StoreKind) -> Result<Vec<String>, StoreError> {
        let entries = self.scan(kind)?;
        let mut evicted = Vec::new();
        for entry in entries.into_iter().skip(self.retention) {
            fs::remove_file(&entry.path)?;
            log_warning(format!("Removed old {} entry: {}", kind.dir_name(), entry.name));
            evicted.push(entry.name);
        }
        Ok(evicted)
    }

    fn scan(&self, kind: StoreKind) -> Result<Vec<StoredTemplate>, StoreError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.dir(kind)?)?.flatten() {
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(StoredTemplate {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                size: metadata.len(),
                modified: DateTime::<Utc>::from(modified),
            });
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new(Config::default().temp_root, DEFAULT_RETENTION)
    }
}

/// Reject names that are empty or would leave the store directory
fn checked_name(name: &str) -> Result<&str, StoreError> {
    let trimmed = name.trim();
    let is_plain = Path::new(trimmed).file_name().is_some_and(|f| f == trimmed);
    if trimmed.is_empty() || !is_plain || trimmed.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}
