/// Read path: `iter()`, `list()`, and `get()`.
///
/// Nothing here is cached except the key indexes: the default source and the
/// live-data file are re-opened on every call, so each iteration starts from
/// the current committed state.
use atomicfile::{AtomicFile, AtomicFileError};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};

use crate::index::{Indexes, KeyIndex};
use crate::record::{primary_key, JsonRecords, Record};
use crate::{LayeredStore, StoreError};

/// Lazy iterator over the merged view: visible defaults, then live records.
///
/// Created by [`LayeredStore::iter`]. Errors are yielded in place; the
/// iterator stops after the first one.
pub struct Records<'a> {
    defaults: Option<JsonRecords<Box<dyn Read>>>,
    tombstones: &'a KeyIndex,
    primary_key: &'a str,
    live: Option<JsonRecords<BufReader<File>>>,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(defaults) = self.defaults.as_mut() {
            for item in defaults.by_ref() {
                match item {
                    Ok(record) => {
                        let hidden = primary_key(&record, self.primary_key)
                            .map_or(false, |key| self.tombstones.contains(key));
                        if !hidden {
                            return Some(Ok(record));
                        }
                    }
                    Err(e) => {
                        self.live = None;
                        return Some(Err(e));
                    }
                }
            }
            self.defaults = None;
        }

        self.live.as_mut()?.next()
    }
}

impl LayeredStore {
    /// Returns a lazy iterator over the merged record view.
    ///
    /// The first call on a store loads the default and tombstone indexes.
    /// Call again to restart from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDefaultData`] if a default record has no
    /// primary key, or an I/O / decoding error if either file or the source
    /// cannot be opened.
    pub fn iter(&mut self) -> Result<Records<'_>, StoreError> {
        let indexes = self.state.get_or_try_init(|| {
            Indexes::load(self.source.as_deref(), &self.deleted, &self.primary_key)
        })?;

        let defaults = match &self.source {
            Some(source) => Some(source.records()?),
            None => None,
        };
        let live = open_live(&self.data)?;

        Ok(Records {
            defaults,
            tombstones: &indexes.tombstones,
            primary_key: &self.primary_key,
            live,
        })
    }

    /// Collects the merged view into a vector.
    pub fn list(&mut self) -> Result<Vec<Record>, StoreError> {
        self.iter()?.collect()
    }

    /// Returns the record whose primary key equals `key`, if any.
    ///
    /// A `null` key matches nothing.
    pub fn get(&mut self, key: &Value) -> Result<Option<Record>, StoreError> {
        if key.is_null() {
            return Ok(None);
        }

        let field = self.primary_key.clone();
        for record in self.iter()? {
            let record = record?;
            if primary_key(&record, &field) == Some(key) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

/// Opens the live-data file, or returns `None` if nothing was written yet.
pub(crate) fn open_live(
    data: &AtomicFile,
) -> Result<Option<JsonRecords<BufReader<File>>>, StoreError> {
    match data.open_read() {
        Ok(reader) => Ok(Some(JsonRecords::new(reader)?)),
        Err(AtomicFileError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
