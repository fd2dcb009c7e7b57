//! Durable storage for search trees, keyed by run id.
//!
//! Stores are a plain save/load pair over [`TreeSnapshot`] JSON. There is no
//! caching: every `load` rebuilds the tree from what was last saved.

use crate::{snapshot::TreeSnapshot, tree::Tree, PersistenceError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Saves and restores whole trees.
pub trait TreeStore: Send + Sync {
    /// Persist `tree` under `run_id`, replacing any earlier save.
    fn save(&self, run_id: &str, tree: &Tree) -> Result<(), PersistenceError>;

    /// Restore the tree last saved under `run_id`.
    ///
    /// # Errors
    /// `NotFound` if nothing was saved, `Corrupt` if the data does not parse,
    /// `UnsupportedVersion` if it was written in another snapshot format,
    /// `Invariant` if it parses but is not a valid tree.
    fn load(&self, run_id: &str) -> Result<Tree, PersistenceError>;
}

fn encode(tree: &Tree) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(&TreeSnapshot::from(tree))?)
}

fn decode(text: &str) -> Result<Tree, PersistenceError> {
    let snapshot: TreeSnapshot = serde_json::from_str(text)?;
    Tree::try_from(snapshot)
}

/// Whether `run_id` is safe to use as a file name.
///
/// Allowed: ASCII letters, digits, `-`, `_` and `.`, not starting with `.`.
pub fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// In-process store. Useful for tests and for embedding callers that
/// persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON saved under `run_id`.
    pub fn raw(&self, run_id: &str) -> Option<String> {
        self.entries.lock().get(run_id).cloned()
    }

    /// Overwrite the raw JSON saved under `run_id`.
    pub fn put_raw(&self, run_id: &str, text: impl Into<String>) {
        self.entries.lock().insert(run_id.to_string(), text.into());
    }
}

impl TreeStore for MemoryStore {
    fn save(&self, run_id: &str, tree: &Tree) -> Result<(), PersistenceError> {
        let text = encode(tree)?;
        self.entries.lock().insert(run_id.to_string(), text);
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<Tree, PersistenceError> {
        let text = self
            .raw(run_id)
            .ok_or_else(|| PersistenceError::NotFound(run_id.to_string()))?;
        decode(&text)
    }
}

/// One pretty-printed JSON file per run: `<dir>/<run_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `run_id`.
    ///
    /// # Errors
    /// Returns an `InvalidInput` I/O error if `run_id` could name a file
    /// outside the store directory.
    pub fn path_for(&self, run_id: &str) -> Result<PathBuf, PersistenceError> {
        if !is_valid_run_id(run_id) {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid run id {run_id:?}"),
            )
            .into());
        }
        Ok(self.dir.join(format!("{run_id}.json")))
    }
}

impl TreeStore for JsonFileStore {
    fn save(&self, run_id: &str, tree: &Tree) -> Result<(), PersistenceError> {
        let path = self.path_for(run_id)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        // A crash mid-write leaves the previous save intact.
        fs::write(&tmp, encode(tree)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, run_id: &str) -> Result<Tree, PersistenceError> {
        match fs::read_to_string(self.path_for(run_id)?) {
            Ok(text) => decode(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PersistenceError::NotFound(run_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
