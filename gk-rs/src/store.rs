//! Persistent command storage.
//!
//! The registry reads a command's script text and invocation counter on
//! every invocation and writes them when an admin authors a command or a
//! stored command runs successfully.  Implementations serialize concurrent
//! writers themselves: script updates are last-writer-wins, and
//! [`CommandStore::increment`] is atomic so no count is lost when the same
//! command runs concurrently.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A user-authored command as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommand {
    /// Script text, exactly as the admin wrote it.
    pub source: String,
    /// Successful invocations so far.
    #[serde(default)]
    pub count: i64,
}

impl StoredCommand {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            count: 0,
        }
    }
}

/// Whether an upsert created a command or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not access command store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("command store {path} is malformed: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not encode command store: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("could not replace command store {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("command store is unavailable: {0}")]
    Unavailable(String),
}

// ── CommandStore ──────────────────────────────────────────────────────────────

pub trait CommandStore: Send + Sync {
    /// Look up `name` (case-sensitive).
    fn get(&self, name: &str) -> Result<Option<StoredCommand>, StorageError>;

    /// Create or replace the script of `name`.  An existing counter is kept.
    fn upsert(&self, name: &str, source: &str) -> Result<Upsert, StorageError>;

    /// Remove `name`; `false` if it did not exist.
    fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Atomically add one to the counter of `name` and return the new value,
    /// or `None` if the command no longer exists.
    fn increment(&self, name: &str) -> Result<Option<i64>, StorageError>;

    /// All stored command names, sorted.
    fn names(&self) -> Result<Vec<String>, StorageError>;
}

fn upsert_into<M: MapLike>(commands: &mut M, name: &str, source: &str) -> Upsert {
    match commands.entry_mut(name) {
        Some(cmd) => {
            cmd.source = source.to_owned();
            Upsert::Updated
        }
        None => {
            commands.insert(name.to_owned(), StoredCommand::new(source));
            Upsert::Added
        }
    }
}

fn increment_in<M: MapLike>(commands: &mut M, name: &str) -> Option<i64> {
    let cmd = commands.entry_mut(name)?;
    cmd.count = cmd.count.saturating_add(1);
    Some(cmd.count)
}

/// The two map types the stores keep commands in.
trait MapLike {
    fn entry_mut(&mut self, name: &str) -> Option<&mut StoredCommand>;
    fn insert(&mut self, name: String, cmd: StoredCommand);
}

impl MapLike for HashMap<String, StoredCommand> {
    fn entry_mut(&mut self, name: &str) -> Option<&mut StoredCommand> {
        self.get_mut(name)
    }
    fn insert(&mut self, name: String, cmd: StoredCommand) {
        HashMap::insert(self, name, cmd);
    }
}

impl MapLike for BTreeMap<String, StoredCommand> {
    fn entry_mut(&mut self, name: &str) -> Option<&mut StoredCommand> {
        self.get_mut(name)
    }
    fn insert(&mut self, name: String, cmd: StoredCommand) {
        BTreeMap::insert(self, name, cmd);
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// Volatile store.  Used by tests and when no store file is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    commands: Mutex<HashMap<String, StoredCommand>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: pre-load a command.
    pub fn with_command(self, name: &str, source: &str) -> Self {
        self.commands
            .lock()
            .insert(name.to_owned(), StoredCommand::new(source));
        self
    }
}

impl CommandStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<StoredCommand>, StorageError> {
        Ok(self.commands.lock().get(name).cloned())
    }

    fn upsert(&self, name: &str, source: &str) -> Result<Upsert, StorageError> {
        Ok(upsert_into(&mut *self.commands.lock(), name, source))
    }

    fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.commands.lock().remove(name).is_some())
    }

    fn increment(&self, name: &str) -> Result<Option<i64>, StorageError> {
        Ok(increment_in(&mut *self.commands.lock(), name))
    }

    fn names(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.commands.lock().keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// On-disk layout of a [`FileStore`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    commands: BTreeMap<String, StoredCommand>,
}

/// Store backed by one TOML file.
///
/// The whole file is held in memory behind a lock. Every write goes to a
/// temporary file in the same directory, which is then renamed over `path`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreFile>,
}

impl FileStore {
    /// Open the store at `path`.  A missing file is an empty store; the file
    /// is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|source| StorageError::Decode {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        debug!(path = %path.display(), commands = state.commands.len(), "opened command store");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, state: &StoreFile) -> Result<(), StorageError> {
        let text = toml::to_string_pretty(state)?;
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|source| StorageError::Persist {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Apply `f` to a copy of the state, write the copy out, and only then
    /// make it current.  `f` returning `None` means nothing changed.  The
    /// lock is held across the write so concurrent updates are serialized.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut StoreFile) -> Option<T>,
    ) -> Result<Option<T>, StorageError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let Some(result) = f(&mut next) else {
            return Ok(None);
        };
        self.save(&next)?;
        *state = next;
        Ok(Some(result))
    }
}

impl CommandStore for FileStore {
    fn get(&self, name: &str) -> Result<Option<StoredCommand>, StorageError> {
        Ok(self.state.lock().commands.get(name).cloned())
    }

    fn upsert(&self, name: &str, source: &str) -> Result<Upsert, StorageError> {
        let outcome = self.update(|state| Some(upsert_into(&mut state.commands, name, source)))?;
        Ok(outcome.unwrap_or(Upsert::Updated))
    }

    fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let removed = self.update(|state| state.commands.remove(name))?;
        Ok(removed.is_some())
    }

    fn increment(&self, name: &str) -> Result<Option<i64>, StorageError> {
        self.update(|state| increment_in(&mut state.commands, name))
    }

    fn names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.state.lock().commands.keys().cloned().collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
