//! Loosely typed key-value store persisted as a single JSON document.
//!
//! [`Store`] is the untyped layer underneath [`SiteConfig`](crate::config::SiteConfig):
//! it knows nothing about which keys exist or what they mean. Typed accessors
//! return a per-type sentinel for a missing key so callers can read optional
//! settings without matching on `Option`:
//!
//! | Accessor | Missing key |
//! |----------|-------------|
//! | [`Store::get_string`] | `""` |
//! | [`Store::get_int`] | `-1` |
//! | [`Store::get_float`] | `-1.0` |
//! | [`Store::get_bool`] | `false` |
//! | [`Store::get_array`] | `[]` |
//!
//! A key that is present but holds the wrong JSON type is an error
//! ([`StoreError::TypeMismatch`]), never a silent default.
//!
//! ## Persistence
//!
//! Every file this crate persists (config, change-tracking snapshot, rendered
//! pages) goes through [`write_atomic`]: bytes land in a temporary file in the
//! destination directory which is then renamed over the target. A crash or a
//! failed write leaves either the old file or the new one, never a truncated
//! mix of both.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object at the top level")]
    NotAnObject,
    #[error("key '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// String keys mapped to arbitrary JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    data: Map<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON object stored at `path`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Self::load_from_str(&text)
    }

    /// Parse a JSON object from memory.
    pub fn load_from_str(text: &str) -> Result<Self, StoreError> {
        match serde_json::from_str(text)? {
            Value::Object(data) => Ok(Self { data }),
            _ => Err(StoreError::NotAnObject),
        }
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.data
    }

    pub fn get_string(&self, key: &str) -> Result<String, StoreError> {
        match self.data.get(key) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(mismatch(key, "string")),
        }
    }

    /// Integer value of `key`. Whole-valued floats (`3.0`) are accepted since
    /// JSON does not distinguish them.
    pub fn get_int(&self, key: &str) -> Result<i64, StoreError> {
        match self.data.get(key) {
            None => Ok(-1),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| mismatch(key, "integer")),
            Some(_) => Err(mismatch(key, "integer")),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64, StoreError> {
        match self.data.get(key) {
            None => Ok(-1.0),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| mismatch(key, "number")),
            Some(_) => Err(mismatch(key, "number")),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, StoreError> {
        match self.data.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(mismatch(key, "boolean")),
        }
    }

    pub fn get_array(&self, key: &str) -> Result<Vec<Value>, StoreError> {
        match self.data.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(mismatch(key, "array")),
        }
    }

    /// Write the store as pretty-printed JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        write_json(path, &self.data)
    }
}

impl From<Map<String, Value>> for Store {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

fn mismatch(key: &str, expected: &'static str) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

// =============================================================================
// Shared JSON-document persistence
// =============================================================================

/// Replace `path` with `bytes` via a temporary sibling file and a rename.
///
/// The temporary file is created in the destination directory so the final
/// rename never crosses a filesystem boundary.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it with [`write_atomic`].
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(path, json.as_bytes()).map_err(|e| StoreError::io(path, e))
}

/// Read and deserialize a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}
