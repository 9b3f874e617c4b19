//! Field snapshots and the value codec.
//!
//! Field values are stored as CBOR, a self-describing binary format: a
//! decode into the wrong type fails instead of producing garbage, and
//! every serde data model value (non-finite floats, non-string map keys,
//! byte strings) round-trips exactly.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Serialize `value` into the byte form stored in a document field.
pub fn encode<T>(value: &T) -> StoreResult<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(StoreError::Encode)?;
    Ok(bytes)
}

/// An immutable snapshot of one document field.
///
/// An item whose value is empty stands for a field that is absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Item {
    key: String,
    value: Vec<u8>,
}

impl Item {
    /// Create an item from a key and already-encoded bytes.
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// The field key, empty for an absent field.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The raw encoded bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume the item and return its raw bytes.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Returns `true` if the item holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Decode the stored bytes into `target`.
    ///
    /// Fails with [`StoreError::InvalidDecode`] when `target` is `None`,
    /// whatever the item holds, then with [`StoreError::EmptyItem`] when
    /// the item is empty. `target` is left untouched on failure.
    pub fn decode_into<T>(&self, target: Option<&mut T>) -> StoreResult<()>
    where
        T: DeserializeOwned,
    {
        let target = target.ok_or(StoreError::InvalidDecode {
            type_name: std::any::type_name::<T>(),
        })?;
        *target = self.decode()?;
        Ok(())
    }

    /// Decode the stored bytes into a new `T`.
    pub fn decode<T>(&self) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        if self.value.is_empty() {
            return Err(StoreError::EmptyItem {
                key: self.key.clone(),
            });
        }
        ciborium::de::from_reader(self.value.as_slice()).map_err(|source| StoreError::Decode {
            key: self.key.clone(),
            source,
        })
    }
}
