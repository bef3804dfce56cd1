//! # AtomicFile - Crash-Safe Whole-File Replacement
//!
//! Wraps one logical file with three physical locations:
//!
//! ```text
//! config.json   main     the last committed version (what readers open)
//! config.tmp    staging  where a new version is written
//! config.old    backup   the version that main replaced most recently
//! ```
//!
//! The staging and backup names drop everything from the first `.` of the
//! file name, so `deleted.idx` stages to `deleted.tmp`. A name without an
//! extension simply gains the suffix (`config` -> `config.tmp`).
//!
//! ## Commit Protocol
//!
//! Writers only ever touch the staging file. [`AtomicWriter::commit`] then:
//!
//! 1. flushes and (optionally) fsyncs the staging file,
//! 2. deletes any existing backup,
//! 3. renames main -> backup,
//! 4. renames staging -> main.
//!
//! A reader holding main open across the commit keeps reading the old
//! content through its handle; a reader that opens main afterwards sees the
//! new content. Nobody ever observes a half-written main file.
//!
//! A writer dropped without `commit` (e.g. because serialization failed part
//! way through) removes the staging file and leaves main untouched.
//!
//! ## Recovery
//!
//! If a crash lands between steps 3 and 4, main is missing while the backup
//! holds the last good version. [`AtomicFile::new`] detects exactly that case
//! and renames backup -> main. Recovery runs only at construction.
//!
//! ## Example
//!
//! ```rust,no_run
//! use atomicfile::AtomicFile;
//! use std::io::{Read, Write};
//!
//! let file = AtomicFile::new("data/config.json", true).unwrap();
//!
//! let mut w = file.open_write().unwrap();
//! w.write_all(b"{\"name\":\"a\"}\n").unwrap();
//! w.commit().unwrap();
//!
//! let mut s = String::new();
//! file.open_read().unwrap().read_to_string(&mut s).unwrap();
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Suffix of the staging file.
pub const TMP_SUFFIX: &str = "tmp";
/// Suffix of the backup file.
pub const BACKUP_SUFFIX: &str = "old";

/// Errors that can occur during atomic file operations.
#[derive(Debug, Error)]
pub enum AtomicFileError {
    /// The main file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An underlying I/O error (open, write, fsync, or rename).
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A file whose contents are replaced atomically.
#[derive(Debug, Clone)]
pub struct AtomicFile {
    path: PathBuf,
    tmp_path: PathBuf,
    backup_path: PathBuf,
    sync: bool,
}

impl AtomicFile {
    /// Binds an atomic file to `path`, restoring the backup if the main file
    /// went missing mid-commit.
    ///
    /// # Arguments
    ///
    /// * `path` - location of the main file. The parent directory must exist.
    /// * `sync` - if true, the staging file is fsynced before it is renamed.
    ///
    /// # Errors
    ///
    /// Returns [`AtomicFileError::Io`] if the backup exists but cannot be
    /// renamed back into place.
    pub fn new<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, AtomicFileError> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = sibling(&path, TMP_SUFFIX);
        let backup_path = sibling(&path, BACKUP_SUFFIX);

        if !path.exists() && backup_path.exists() {
            info!(
                path = %path.display(),
                "main file missing, restoring from backup"
            );
            fs::rename(&backup_path, &path)?;
        }

        Ok(Self {
            path,
            tmp_path,
            backup_path,
            sync,
        })
    }

    /// Path of the main (committed) file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the staging file used by writers.
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Path of the backup holding the previously committed version.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Returns whether commits fsync the staging file before renaming.
    pub fn sync(&self) -> bool {
        self.sync
    }

    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    /// Returns `true` if the main file currently exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Opens the committed content for reading.
    ///
    /// # Errors
    ///
    /// Returns [`AtomicFileError::NotFound`] if the main file does not exist.
    pub fn open_read(&self) -> Result<BufReader<File>, AtomicFileError> {
        match File::open(&self.path) {
            Ok(f) => Ok(BufReader::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AtomicFileError::NotFound(self.path.clone()))
            }
            Err(e) => Err(AtomicFileError::Io(e)),
        }
    }

    /// Starts a new version. Nothing written is visible under the main name
    /// until [`AtomicWriter::commit`] is called.
    ///
    /// Any stale staging file from an earlier crash is truncated.
    pub fn open_write(&self) -> Result<AtomicWriter, AtomicFileError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.tmp_path)?;

        Ok(AtomicWriter {
            inner: Some(BufWriter::new(file)),
            path: self.path.clone(),
            tmp_path: self.tmp_path.clone(),
            backup_path: self.backup_path.clone(),
            sync: self.sync,
        })
    }

    /// Writes a new version with `f` and commits it if `f` succeeds.
    ///
    /// If `f` returns an error the staging file is discarded and the error is
    /// returned unchanged; main keeps its previous content.
    pub fn replace_with<F, E>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut AtomicWriter) -> Result<(), E>,
        E: From<AtomicFileError>,
    {
        let mut writer = self.open_write()?;
        f(&mut writer)?;
        writer.commit()?;
        Ok(())
    }
}

/// Write handle for the staging file of an [`AtomicFile`].
///
/// Dropping the writer without calling [`commit`](AtomicWriter::commit)
/// abandons the new version.
pub struct AtomicWriter {
    inner: Option<BufWriter<File>>,
    path: PathBuf,
    tmp_path: PathBuf,
    backup_path: PathBuf,
    sync: bool,
}

impl AtomicWriter {
    /// Publishes the staged content under the main name.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing, fsync, or any rename fails. If the
    /// failure happens after main was moved to the backup, the next
    /// [`AtomicFile::new`] restores it.
    pub fn commit(mut self) -> Result<(), AtomicFileError> {
        let Some(writer) = self.inner.take() else {
            return Ok(());
        };

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        if self.sync {
            file.sync_all()?;
        }
        drop(file);

        remove_if_exists(&self.backup_path)?;
        match fs::rename(&self.path, &self.backup_path) {
            Ok(()) => {}
            // First commit: there is no previous version to back up.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&self.tmp_path, &self.path)?;

        debug!(path = %self.path.display(), "committed new version");
        Ok(())
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already committed"))
    }
}

impl Write for AtomicWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

/// Abandons an uncommitted version. Errors are ignored because Drop cannot
/// propagate them; a leftover staging file is truncated by the next writer.
impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.inner.take() {
            drop(writer);
            warn!(
                path = %self.tmp_path.display(),
                "discarding uncommitted staging file"
            );
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Derives a sibling path by replacing everything from the first `.` of the
/// file name with `.{suffix}`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.find('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name.as_str(),
    };
    path.with_file_name(format!("{}.{}", stem, suffix))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
