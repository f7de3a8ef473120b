// MCP Scout -- store
//! Local JSON record of installed servers.
//!
//! The whole document is the unit of change: load, mutate in memory, write
//! back. Writes are staged to a sibling temporary file and renamed over the
//! canonical path, so readers only ever see the old or the new document.
//! Mutations go through [`ConfigStore::update`], which holds an exclusive
//! advisory lock on `<file>.lock` for the whole load-mutate-save cycle.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs4::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ScoutError, ScoutResult};

/// Top-level field holding identifier -> record.
pub const SERVERS_KEY: &str = "mcpServers";

/// A locally persisted install, keyed by identifier inside [`Config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledRecord {
    /// Program that was executed for the install.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Passthrough configuration (environment variables for the server).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    pub installed_at: DateTime<Utc>,
    /// Name the server was registered under with the host CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_name: Option<String>,
}

impl InstalledRecord {
    /// Full argv (`command` followed by `args`).
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, InstalledRecord>,
    /// Unknown top-level fields, preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    /// Insert or overwrite. Returns the replaced record, if any.
    pub fn upsert(&mut self, id: &str, record: InstalledRecord) -> Option<InstalledRecord> {
        self.servers.insert(id.to_string(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<InstalledRecord> {
        self.servers.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&InstalledRecord> {
        self.servers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.servers.contains_key(id)
    }
}

/// Held for the duration of a transaction; dropping the file releases the lock.
#[derive(Debug)]
pub struct ConfigLock {
    _file: File,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document. A missing file is an empty config.
    pub fn load(&self) -> ScoutResult<Config> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ScoutError::ConfigIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| ScoutError::CorruptConfig {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Atomically replace the document on disk.
    pub fn save(&self, config: &Config) -> ScoutResult<()> {
        let staged = self.write_staged(config)?;
        self.commit(&staged)
    }

    /// Lock, load, apply `f`, and save if `f` succeeded and changed anything.
    pub fn update<T>(&self, f: impl FnOnce(&mut Config) -> ScoutResult<T>) -> ScoutResult<T> {
        let _lock = self.lock()?;
        let original = self.load()?;
        let mut config = original.clone();
        let value = f(&mut config)?;
        if config != original {
            self.save(&config)?;
            tracing::debug!(path = %self.path.display(), "store: config saved");
        }
        Ok(value)
    }

    /// Exclusive advisory lock on the sibling `<file>.lock`.
    pub fn lock(&self) -> ScoutResult<ConfigLock> {
        let lock_path = self.sibling(&format!("{}.lock", self.file_name()));
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| self.io_error(source))?;
        file.lock_exclusive().map_err(|source| self.io_error(source))?;
        Ok(ConfigLock { _file: file })
    }

    /// First half of `save`: write and fsync a sibling temp file.
    pub(crate) fn write_staged(&self, config: &Config) -> ScoutResult<PathBuf> {
        self.ensure_parent()?;
        let mut bytes = serde_json::to_vec_pretty(config)
            .map_err(|e| ScoutError::Internal(format!("failed to serialize config: {}", e)))?;
        bytes.push(b'\n');

        let staged = self.sibling(&format!(
            ".{}.{}.tmp",
            self.file_name(),
            Uuid::new_v4().simple()
        ));
        let written = File::create(&staged).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(source) = written {
            let _ = fs::remove_file(&staged);
            return Err(self.io_error(source));
        }
        Ok(staged)
    }

    /// Second half of `save`: rename the staged file into place.
    pub(crate) fn commit(&self, staged: &Path) -> ScoutResult<()> {
        if let Err(source) = fs::rename(staged, &self.path) {
            let _ = fs::remove_file(staged);
            return Err(self.io_error(source));
        }
        if let Some(parent) = self.path.parent() {
            fsync_dir(parent);
        }
        Ok(())
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.json".to_string())
    }

    fn sibling(&self, name: &str) -> PathBuf {
        match self.path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    fn ensure_parent(&self) -> ScoutResult<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))
            }
            _ => Ok(()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ScoutError {
        ScoutError::ConfigIo {
            path: self.path.clone(),
            source,
        }
    }
}

/// Best effort: persist the rename itself.
fn fsync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}
