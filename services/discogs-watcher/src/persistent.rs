//! src/persistent.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines module for persisting the tracked release ids between runs
//!

use std::{fs, io, path::{Path, PathBuf}};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::WatcherError;

///
/// Named-entry storage. Reads never fail the caller, a missing entry is None
///
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, WatcherError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WatcherError>;
}

/// One json file per key under `root`, replaced atomically on every write
pub struct FileStore {
    root: PathBuf
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::sanitize_key(key)))
    }

    fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, WatcherError> {
        match fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into())
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WatcherError> {
        let path = self.path(key);
        fs::create_dir_all(&self.root)?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.root)?;
        io::Write::write_all(&mut temp, value.as_bytes())?;
        temp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

///
/// Pure operations over the ordered id list
///

/// Appends `id` unless it is already tracked
pub fn add(current: &[u64], id: u64) -> Vec<u64> {
    let mut next = current.to_vec();
    if !current.contains(&id) {
        next.push(id);
    }
    next
}

/// Drops `id`, remaining order untouched
pub fn remove(current: &[u64], id: u64) -> Vec<u64> {
    current.iter().copied().filter(|&x| x != id).collect()
}

pub fn encode_ids(ids: &[u64]) -> String {
    Value::from(ids.to_vec()).to_string()
}

/// Lenient decode: anything that is not an array yields an empty list,
/// entries that are not positive whole numbers are dropped
pub fn decode_ids(raw: &str) -> Vec<u64> {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw) else {
        debug!(raw_len = raw.len(), "store.decode.malformed");
        return Vec::new();
    };

    let mut ids: Vec<u64> = Vec::with_capacity(entries.len());
    for entry in &entries {
        match coerce_id(entry) {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {},
            None => debug!(entry = %entry, "store.decode.drop"),
        }
    }
    ids
}

fn coerce_id(entry: &Value) -> Option<u64> {
    if let Some(n) = entry.as_u64() {
        return (n > 0).then_some(n);
    }
    let n = match entry {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let whole = n.is_finite() && n >= 1.0 && n.fract() == 0.0 && n <= u64::MAX as f64;
    whole.then_some(n as u64)
}

///
/// Single-writer owner of the tracked ids. Every mutation is written through
/// in full, a failed write is logged and the in-memory list stays authoritative
///
pub struct IdentifierStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
    ids: Vec<u64>
}

impl IdentifierStore {
    pub fn load(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let ids = match backend.get(&key) {
            Ok(Some(raw)) => decode_ids(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!(error = %e, key = %key, "store.read.failed");
                Vec::new()
            }
        };
        debug!(key = %key, count = ids.len(), "store.load");
        Self { backend, key, ids }
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Returns whether the list changed
    pub fn add(&mut self, id: u64) -> bool {
        let next = add(&self.ids, id);
        self.replace(next)
    }

    /// Returns whether the list changed
    pub fn remove(&mut self, id: u64) -> bool {
        let next = remove(&self.ids, id);
        self.replace(next)
    }

    fn replace(&mut self, next: Vec<u64>) -> bool {
        if next == self.ids {
            return false;
        }
        self.ids = next;
        self.persist();
        true
    }

    fn persist(&self) {
        match self.backend.set(&self.key, &encode_ids(&self.ids)) {
            Ok(()) => debug!(key = %self.key, count = self.ids.len(), "store.write"),
            Err(e) => warn!(error = %e, key = %self.key, "store.write.failed"),
        }
    }
}
