use serde::Serialize;

use crate::error::StoreResult;
use crate::item::{encode, Item};
use crate::map::ConcurrentMap;

/// Read access to a document's fields.
pub trait DocumentReader {
    /// Snapshot of one field. An absent field yields an empty [`Item`].
    fn get(&self, key: &str) -> Item;

    /// Snapshot of every field, order unspecified.
    fn get_all(&self) -> Vec<Item>;
}

/// Write access to a document's fields.
pub trait DocumentWriter {
    /// Encode `value` and store it under `key`.
    fn set<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized;

    /// Remove the field. No-op if absent.
    fn delete(&self, key: &str);
}

/// Combined read/write access, implemented for every reader + writer.
pub trait DocumentReadWriter: DocumentReader + DocumentWriter {}

impl<D: DocumentReader + DocumentWriter + ?Sized> DocumentReadWriter for D {}

/// A named bag of independently keyed, individually encoded fields.
#[derive(Debug)]
pub struct Document {
    name: String,
    fields: ConcurrentMap<String, Vec<u8>>,
}

impl Document {
    /// Create an empty document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: ConcurrentMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store already-encoded bytes under `key` without re-encoding them.
    pub fn raw_set(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.fields.set(key.into(), bytes);
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field keys, order unspecified.
    pub fn keys(&self) -> Vec<String> {
        self.fields.keys()
    }

    /// Point-in-time copy of `(key, bytes)` pairs for flushing.
    pub(crate) fn raw_fields(&self) -> Vec<(String, Vec<u8>)> {
        self.fields.snapshot()
    }
}

impl DocumentReader for Document {
    fn get(&self, key: &str) -> Item {
        match self.fields.get(key) {
            Some(bytes) => Item::new(key, bytes),
            None => Item::default(),
        }
    }

    fn get_all(&self) -> Vec<Item> {
        self.fields
            .snapshot()
            .into_iter()
            .map(|(k, v)| Item::new(k, v))
            .collect()
    }
}

impl DocumentWriter for Document {
    fn set<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        let bytes = encode(value)?;
        self.fields.set(key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.fields.delete(key);
    }
}
