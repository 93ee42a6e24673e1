//! # Key/value persistence
//!
//! The durable side of a session: a flat string-to-string store in the spirit of browser
//! local storage. Writes go through [`KeyValueStore::write_batch`], which applies every entry
//! or none of them, so a cache update and the matching inventory update land together.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;

pub const CACHES_KEY: &str = "caches";
pub const INVENTORY_KEY: &str = "inventory";
pub const POSITION_KEY: &str = "position";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Applies all entries atomically.
    fn write_batch(&mut self, entries: Vec<(String, String)>) -> Result<(), PersistenceError>;

    fn clear(&mut self) -> Result<(), PersistenceError>;

    fn set(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.write_batch(vec![(key.to_string(), value)])
    }
}

/// In-process store. Nothing survives the process; used for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_batch(&mut self, entries: Vec<(String, String)>) -> Result<(), PersistenceError> {
        self.entries.extend(entries);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        self.entries.clear();
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every batch rewrites the whole file through a sibling temp file and a rename, so readers
/// never see a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let entries: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::debug!("[Persistence] Opened {} with {} keys", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        let text = serde_json::to_string(entries)?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_batch(&mut self, entries: Vec<(String, String)>) -> Result<(), PersistenceError> {
        let mut next = self.entries.clone();
        next.extend(entries);
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistenceError> {
        let empty = BTreeMap::new();
        self.flush(&empty)?;
        self.entries = empty;
        Ok(())
    }
}
