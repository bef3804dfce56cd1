//! # Store - Layered Configuration Record Store
//!
//! An embedded, file-backed store for a small set of uniquely-keyed records
//! (application configuration). An optional read-only **default source**
//! seeds the store; users can then override or delete individual defaults
//! without ever touching the source itself.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ default source   (read-only, any order)  │──┐
//! ├──────────────────────────────────────────┤  │ minus
//! │ deleted.idx      (tombstoned keys)       │──┘
//! ├──────────────────────────────────────────┤
//! │ config.json      (user records, NDJSON)  │  appended after defaults
//! └──────────────────────────────────────────┘
//! ```
//!
//! Iteration yields every default record whose key is not tombstoned, in
//! source order, followed by every live record in file order. Inserting or
//! deleting a key that is still a visible default tombstones it first, so the
//! merged view never holds two records with the same key.
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                 |
//! |-------------|----------------------------------------------------------|
//! | [`lib.rs`]  | `LayeredStore` struct, constructors, errors, `Debug`     |
//! | [`index`]   | Default and tombstone key indexes, tombstone file codec  |
//! | [`read`]    | `iter()`, `list()`, `get()`                              |
//! | [`write`]   | `insert()`, `delete()`, full live-data rewrite           |
//! | [`record`]  | `Record` type, key extraction, NDJSON reader/writer      |
//! | [`source`]  | `RecordSource` trait, file and in-memory sources         |
//!
//! ## Durability
//!
//! Both files are [`AtomicFile`]s: every mutation rewrites the whole file to
//! a staging path and renames it into place, so readers see either the old
//! or the new version, never a mix. The store assumes a single writer at a
//! time; two concurrent mutators race and the last rewrite wins.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use store::{LayeredStore, MemorySource, Record};
//!
//! let defaults = MemorySource::new("drivers", r#"[{"name": "HSQLDB"}]"#);
//! let mut store = LayeredStore::with_defaults(defaults, "data/config", "name").unwrap();
//!
//! let mut record = Record::new();
//! record.insert("name".into(), json!("HSQLDB"));
//! record.insert("port".into(), json!(9001));
//! store.insert(&record).unwrap();
//!
//! for record in store.iter().unwrap() {
//!     println!("{}", serde_json::Value::Object(record.unwrap()));
//! }
//! ```
mod index;
mod read;
mod record;
mod source;
mod write;

use atomicfile::{AtomicFile, AtomicFileError};
use codec::CodecError;
use index::Indexes;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use read::Records;
pub use record::{primary_key, JsonRecords, Record};
pub use source::{FileSource, MemorySource, RecordSource};

/// Name of the live-data file within the store directory.
pub const DATA_FILENAME: &str = "config.json";

/// Name of the tombstone index file within the store directory.
pub const TOMBSTONE_FILENAME: &str = "deleted.idx";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file the operation needed to read does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A filesystem error while reading, writing, or renaming.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A default record has no primary-key value.
    #[error("invalid default data: {0}")]
    InvalidDefaultData(String),

    /// Record data that is not valid JSON or not an object.
    #[error("malformed record data: {0}")]
    Malformed(serde_json::Error),

    /// The tombstone index could not be encoded or decoded.
    #[error("tombstone index codec error: {0}")]
    Codec(#[from] CodecError),

    /// The tombstone index decoded but does not have the expected shape.
    #[error("corrupt tombstone index: {0}")]
    CorruptIndex(String),
}

impl From<AtomicFileError> for StoreError {
    fn from(e: AtomicFileError) -> Self {
        match e {
            AtomicFileError::NotFound(path) => StoreError::NotFound(path),
            AtomicFileError::Io(e) => StoreError::Io(e),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            StoreError::Io(e.into())
        } else {
            StoreError::Malformed(e)
        }
    }
}

/// Index lifecycle: loaded once on the first read or mutation, then held for
/// the lifetime of the store instance.
pub(crate) enum IndexState {
    Uninitialized,
    Initialized(Indexes),
}

impl IndexState {
    /// Returns the cached indexes, running `load` on the first call.
    pub(crate) fn get_or_try_init<F>(&mut self, load: F) -> Result<&mut Indexes, StoreError>
    where
        F: FnOnce() -> Result<Indexes, StoreError>,
    {
        if let IndexState::Uninitialized = self {
            *self = IndexState::Initialized(load()?);
        }
        match self {
            IndexState::Initialized(indexes) => Ok(indexes),
            IndexState::Uninitialized => unreachable!("index state was initialized above"),
        }
    }
}

/// A record store layering user data over an optional read-only default set.
///
/// # Read Path
///
/// 1. Load the default and tombstone indexes (first call only).
/// 2. Stream default records, skipping tombstoned keys.
/// 3. Stream live records from `config.json`.
///
/// # Write Path
///
/// 1. If the key is a still-visible default, tombstone it and rewrite
///    `deleted.idx`.
/// 2. Rewrite `config.json` without the key, appending the new record last
///    on insert.
///
/// The default index is rebuilt from the source every time a store is
/// constructed; the tombstone index persists across instances. An
/// initialized instance does not notice later external changes to either.
pub struct LayeredStore {
    pub(crate) directory: PathBuf,
    pub(crate) primary_key: String,
    pub(crate) source: Option<Box<dyn RecordSource>>,
    /// Live user records.
    pub(crate) data: AtomicFile,
    /// Tombstoned default keys.
    pub(crate) deleted: AtomicFile,
    pub(crate) state: IndexState,
}

impl fmt::Debug for LayeredStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("LayeredStore");
        s.field("directory", &self.directory)
            .field("primary_key", &self.primary_key)
            .field("source", &self.source)
            .field("sync", &self.data.sync())
            .field("live_data_exists", &self.data.exists());
        match &self.state {
            IndexState::Uninitialized => s.field("initialized", &false),
            IndexState::Initialized(indexes) => s
                .field("initialized", &true)
                .field("default_count", &indexes.defaults.len())
                .field("tombstone_count", &indexes.tombstones.len()),
        };
        s.finish()
    }
}

impl LayeredStore {
    /// Opens a store with no default source.
    pub fn new<P: AsRef<Path>>(directory: P, primary_key: &str) -> Result<Self, StoreError> {
        Self::open(directory, None, primary_key)
    }

    /// Opens a store seeded from `source`.
    pub fn with_defaults<S, P>(source: S, directory: P, primary_key: &str) -> Result<Self, StoreError>
    where
        S: RecordSource + 'static,
        P: AsRef<Path>,
    {
        Self::open(directory, Some(Box::new(source)), primary_key)
    }

    /// Opens a store in `directory`, creating the directory if needed.
    ///
    /// Backup recovery for both files runs here; no content is read until the
    /// first call to [`iter`](Self::iter), [`insert`](Self::insert), or
    /// [`delete`](Self::delete).
    ///
    /// # Arguments
    ///
    /// * `directory` - where `config.json` and `deleted.idx` live.
    /// * `source` - optional read-only default records.
    /// * `primary_key` - name of the field that uniquely identifies a record.
    pub fn open<P: AsRef<Path>>(
        directory: P,
        source: Option<Box<dyn RecordSource>>,
        primary_key: &str,
    ) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();

        std::fs::create_dir_all(&directory)?;

        let data = AtomicFile::new(directory.join(DATA_FILENAME), true)?;
        let deleted = AtomicFile::new(directory.join(TOMBSTONE_FILENAME), true)?;

        Ok(Self {
            directory,
            primary_key: primary_key.to_string(),
            source,
            data,
            deleted,
            state: IndexState::Uninitialized,
        })
    }

    /// Returns the primary-key field name.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns the store directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the default source, if any.
    #[must_use]
    pub fn source(&self) -> Option<&dyn RecordSource> {
        self.source.as_deref()
    }

    /// Returns `true` once the key indexes have been loaded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, IndexState::Initialized(_))
    }

    /// Enables or disables fsync of staged files before they are renamed
    /// into place. Enabled by default.
    pub fn set_sync(&mut self, sync: bool) {
        self.data.set_sync(sync);
        self.deleted.set_sync(sync);
    }
}

#[cfg(test)]
mod tests;
