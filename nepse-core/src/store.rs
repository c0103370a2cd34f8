//! Single-record snapshot cache.
//!
//! The cache holds exactly one [`CacheEnvelope`]: the last trading snapshot
//! and the instant it was taken. It is replaced wholesale, never patched.
//!
//! Stores:
//! - [`FileStore`]: one JSON file, written atomically (`.tmp` then rename)
//! - [`MemoryStore`]: in-process, for tests and embedding

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::table::Table;

/// A trading snapshot and the instant it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Table,
}

impl CacheEnvelope {
    pub fn new(timestamp: DateTime<Utc>, data: Table) -> Self {
        Self { timestamp, data }
    }

    /// Parse an envelope from JSON text.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        serde_json::from_str(text).map_err(StoreError::Corrupt)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(StoreError::Serialize)
    }
}

/// Accept RFC 3339 instants, and offset-less ISO timestamps as UTC.
///
/// Older cache files were written with a naive `isoformat()` timestamp.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Errors from reading or writing a cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache entry is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("cache serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

/// Where the trading snapshot cache lives.
///
/// Implementations must replace the record atomically so concurrent readers
/// see either the old or the new envelope.
pub trait CacheStore: Send + Sync {
    /// Current envelope, or `None` if nothing has been cached yet.
    fn read(&self) -> Result<Option<CacheEnvelope>, StoreError>;

    /// Replace the cached envelope.
    fn write(&self, envelope: &CacheEnvelope) -> Result<(), StoreError>;
}

/// Cache backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CacheStore for FileStore {
    fn read(&self) -> Result<Option<CacheEnvelope>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        CacheEnvelope::from_json(&text).map(Some)
    }

    fn write(&self, envelope: &CacheEnvelope) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let json = envelope.to_json()?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            self.io_error(e)
        })
    }
}

/// Cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: RwLock<Option<CacheEnvelope>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `envelope`.
    pub fn with_envelope(envelope: CacheEnvelope) -> Self {
        Self {
            slot: RwLock::new(Some(envelope)),
        }
    }
}

impl CacheStore for MemoryStore {
    fn read(&self) -> Result<Option<CacheEnvelope>, StoreError> {
        self.slot
            .read()
            .map(|slot| slot.clone())
            .map_err(|_| StoreError::Poisoned)
    }

    fn write(&self, envelope: &CacheEnvelope) -> Result<(), StoreError> {
        let mut slot = self.slot.write().map_err(|_| StoreError::Poisoned)?;
        *slot = Some(envelope.clone());
        Ok(())
    }
}
