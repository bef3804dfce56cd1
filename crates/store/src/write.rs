/// Write path: `insert()`, `delete()`, `delete_record()`.
///
/// Every mutation rewrites `config.json` in full through its atomic file:
/// stream the old records, drop the one being replaced, write the rest to the
/// staging file, then commit. First-time overrides or deletions of a default
/// record also append to the tombstone index and rewrite `deleted.idx`.
use serde_json::Value;
use tracing::debug;

use crate::index::{self, Indexes};
use crate::read::open_live;
use crate::record::{primary_key, write_record, Record};
use crate::{LayeredStore, StoreError};

impl LayeredStore {
    /// Deletes the record with primary key `key`.
    ///
    /// If `key` names a visible default record, it is tombstoned so that it
    /// stays hidden across restarts. Any live record with the key is removed.
    /// Deleting a key that matches nothing is a silent no-op, and a `null`
    /// key never matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the indexes cannot be loaded or either file cannot
    /// be rewritten. A failed tombstone write leaves the in-memory index
    /// unchanged.
    pub fn delete(&mut self, key: &Value) -> Result<(), StoreError> {
        let indexes = self.state.get_or_try_init(|| {
            Indexes::load(self.source.as_deref(), &self.deleted, &self.primary_key)
        })?;

        if !key.is_null() && indexes.shadows_default(key) {
            indexes.tombstones.push(key.clone());
            if let Err(e) = index::save_tombstones(&self.deleted, &indexes.tombstones) {
                indexes.tombstones.pop();
                return Err(e);
            }
            debug!(
                key = %key,
                tombstones = indexes.tombstones.len(),
                "tombstoned default record"
            );
        }

        // Nothing written yet, so there is no live copy to remove.
        if !self.data.exists() {
            return Ok(());
        }

        self.rewrite_live(Some(key), None)
    }

    /// Deletes `record` by its primary-key value.
    pub fn delete_record(&mut self, record: &Record) -> Result<(), StoreError> {
        let key = primary_key(record, &self.primary_key)
            .cloned()
            .unwrap_or(Value::Null);
        self.delete(&key)
    }

    /// Inserts `record`, replacing any record with the same primary key.
    ///
    /// The record is always written last, so updating an existing key moves
    /// it to the end of the merged view. If the key belongs to a visible
    /// default, that default is tombstoned first.
    ///
    /// A record without a primary-key value is appended unconditionally and
    /// never replaces anything.
    pub fn insert(&mut self, record: &Record) -> Result<(), StoreError> {
        let key = primary_key(record, &self.primary_key).cloned();

        let indexes = self.state.get_or_try_init(|| {
            Indexes::load(self.source.as_deref(), &self.deleted, &self.primary_key)
        })?;
        let shadows_default = key.as_ref().map_or(false, |k| indexes.shadows_default(k));

        // Tombstones the default and clears any stale live copy.
        if let Some(key) = key.as_ref().filter(|_| shadows_default) {
            self.delete(key)?;
        }

        self.rewrite_live(key.as_ref(), Some(record))
    }

    /// Rewrites the live-data file, dropping records whose key equals `key`
    /// and appending `append` at the end.
    fn rewrite_live(&self, key: Option<&Value>, append: Option<&Record>) -> Result<(), StoreError> {
        let existing = open_live(&self.data)?;
        let field = self.primary_key.as_str();
        let mut kept = 0usize;
        let mut dropped = 0usize;

        self.data.replace_with(|w| -> Result<(), StoreError> {
            if let Some(records) = existing {
                for record in records {
                    let record = record?;
                    if key.is_some() && primary_key(&record, field) == key {
                        dropped += 1;
                        continue;
                    }
                    write_record(w, &record)?;
                    kept += 1;
                }
            }

            if let Some(record) = append {
                write_record(w, record)?;
            }
            Ok(())
        })?;

        debug!(
            kept,
            dropped,
            appended = append.is_some(),
            "rewrote live data"
        );
        Ok(())
    }
}
