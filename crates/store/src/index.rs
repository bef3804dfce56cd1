/// # Key Indexes - Defaults and Tombstones
///
/// Two ordered key lists drive the layered view:
///
/// - the **default index**: primary keys of the default source, rebuilt from
///   the source each time a store initializes and never persisted;
/// - the **tombstone index**: default keys the user deleted or overrode,
///   persisted in `deleted.idx` and rewritten in full on every change.
///
/// ## Tombstone File Format
///
/// ```text
/// [value: count][value: key]*count
/// ```
///
/// Each `value` uses the [`codec`] binary encoding, so keys keep their JSON
/// type (a string key never matches a numeric one).
use atomicfile::AtomicFile;
use serde_json::Value;
use tracing::debug;

use crate::record::primary_key;
use crate::source::RecordSource;
use crate::StoreError;

/// An ordered list of primary-key values.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct KeyIndex {
    keys: Vec<Value>,
}

impl KeyIndex {
    pub(crate) fn contains(&self, key: &Value) -> bool {
        self.keys.contains(key)
    }

    pub(crate) fn push(&mut self, key: Value) {
        self.keys.push(key);
    }

    pub(crate) fn pop(&mut self) -> Option<Value> {
        self.keys.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Value> {
        self.keys.iter()
    }
}

/// Both indexes, loaded together on a store's first operation.
#[derive(Debug)]
pub(crate) struct Indexes {
    pub(crate) defaults: KeyIndex,
    pub(crate) tombstones: KeyIndex,
}

impl Indexes {
    pub(crate) fn load(
        source: Option<&dyn RecordSource>,
        deleted: &AtomicFile,
        field: &str,
    ) -> Result<Self, StoreError> {
        let defaults = match source {
            Some(source) => build_default_index(source, field)?,
            None => KeyIndex::default(),
        };
        let tombstones = load_tombstones(deleted)?;

        debug!(
            defaults = defaults.len(),
            tombstones = tombstones.len(),
            "loaded key indexes"
        );

        Ok(Self {
            defaults,
            tombstones,
        })
    }

    /// Returns `true` if `key` names a default record that is still visible.
    pub(crate) fn shadows_default(&self, key: &Value) -> bool {
        self.defaults.contains(key) && !self.tombstones.contains(key)
    }
}

/// Collects the primary keys of every default record, in source order.
///
/// # Errors
///
/// Returns [`StoreError::InvalidDefaultData`] if any record lacks a key.
pub(crate) fn build_default_index(
    source: &dyn RecordSource,
    field: &str,
) -> Result<KeyIndex, StoreError> {
    let mut index = KeyIndex::default();

    for record in source.records()? {
        let record = record?;
        match primary_key(&record, field) {
            Some(key) => index.push(key.clone()),
            None => {
                return Err(StoreError::InvalidDefaultData(format!(
                    "default record has no '{}' value: {}",
                    field,
                    Value::Object(record)
                )))
            }
        }
    }

    Ok(index)
}

/// Reads the tombstone index, or returns an empty one if the file does not
/// exist yet.
pub(crate) fn load_tombstones(file: &AtomicFile) -> Result<KeyIndex, StoreError> {
    let mut index = KeyIndex::default();

    if !file.exists() {
        return Ok(index);
    }

    let mut reader = file.open_read()?;
    let count = codec::read_value(&mut reader)?;
    let count = count.as_u64().ok_or_else(|| {
        StoreError::CorruptIndex(format!("expected an entry count, found {}", count))
    })?;

    for _ in 0..count {
        index.push(codec::read_value(&mut reader)?);
    }

    Ok(index)
}

/// Rewrites the tombstone file from `index`.
pub(crate) fn save_tombstones(file: &AtomicFile, index: &KeyIndex) -> Result<(), StoreError> {
    file.replace_with(|w| -> Result<(), StoreError> {
        codec::write_value(w, &Value::from(index.len() as u64))?;
        for key in index.iter() {
            codec::write_value(w, key)?;
        }
        Ok(())
    })
}
