/// Default-record sources.
///
/// A source only needs to hand out a fresh byte stream on demand; the store
/// re-reads it from the start on every iteration.
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::record::JsonRecords;
use crate::StoreError;

/// Anything that can produce a lazy sequence of records.
pub trait RecordSource: fmt::Debug + Send + Sync {
    /// Opens a new stream positioned at the first record.
    fn open(&self) -> io::Result<Box<dyn Read>>;

    /// Returns a lazy iterator over the source's records.
    fn records(&self) -> Result<JsonRecords<Box<dyn Read>>, StoreError> {
        JsonRecords::new(self.open()?)
    }
}

/// Records stored in a JSON file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Records held in memory, typically a resource bundled with
/// `include_str!`.
#[derive(Clone)]
pub struct MemorySource {
    name: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl RecordSource for MemorySource {
    fn open(&self) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }
}
