use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::document::{DocumentReadWriter, DocumentReader};
use crate::error::StoreResult;

/// Decode `key` from `doc`, falling back to `default()` when the field is
/// absent.
///
/// Only an absent field triggers the fallback. Other decode failures yield
/// `T::default()`; use [`get_set_with_default`] to observe them.
pub fn get_with_default<T, D, F>(doc: &D, key: &str, default: F) -> T
where
    T: DeserializeOwned + Default,
    D: DocumentReader + ?Sized,
    F: FnOnce() -> T,
{
    match doc.get(key).decode::<T>() {
        Ok(value) => value,
        Err(e) if e.is_empty_item() => default(),
        Err(_) => T::default(),
    }
}

/// Like [`get_with_default`], but also stores the default in `doc` when the
/// field is absent.
///
/// Decode failures other than an absent field are returned unchanged.
pub fn get_set_with_default<T, D, F>(doc: &D, key: &str, default: F) -> StoreResult<T>
where
    T: DeserializeOwned + Serialize,
    D: DocumentReadWriter,
    F: FnOnce() -> T,
{
    match doc.get(key).decode::<T>() {
        Ok(value) => Ok(value),
        Err(e) if e.is_empty_item() => {
            let value = default();
            doc.set(key, &value)?;
            Ok(value)
        }
        Err(e) => Err(e),
    }
}
