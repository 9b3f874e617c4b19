use std::sync::Arc;

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::map::ConcurrentMap;

/// Read access to a collection's documents.
pub trait CollectionReader {
    /// The document stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Arc<Document>>;

    /// Every document of this collection, order unspecified.
    ///
    /// Subcollections are not included.
    fn get_all(&self) -> Vec<Arc<Document>>;
}

/// Write access to a collection's documents.
pub trait CollectionWriter {
    /// Insert or replace the document under `key`.
    ///
    /// Fails with [`StoreError::NilDocument`] when `document` is `None`.
    fn set(&self, key: &str, document: Option<Arc<Document>>) -> StoreResult<()>;

    /// Remove the document under `key`. No-op if absent.
    fn delete(&self, key: &str);
}

/// Combined read/write access, implemented for every reader + writer.
pub trait CollectionReadWriter: CollectionReader + CollectionWriter {}

impl<C: CollectionReader + CollectionWriter + ?Sized> CollectionReadWriter for C {}

/// A named node holding documents and nested collections, like a directory.
///
/// A document and a subcollection may share a name; the two maps are
/// independent.
#[derive(Debug)]
pub struct Collection {
    name: String,
    documents: ConcurrentMap<String, Arc<Document>>,
    collections: ConcurrentMap<String, Arc<Collection>>,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: ConcurrentMap::new(),
            collections: ConcurrentMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the document `name`, creating an empty one if absent.
    pub fn document(&self, name: &str) -> Arc<Document> {
        self.documents
            .get_or_insert_with(name.to_string(), || Arc::new(Document::new(name)))
    }

    /// Return the subcollection `name`, creating an empty one if absent.
    pub fn collection(&self, name: &str) -> Arc<Collection> {
        self.collections
            .get_or_insert_with(name.to_string(), || Arc::new(Collection::new(name)))
    }

    /// The subcollection stored under `key`, if any.
    pub fn get_collection(&self, key: &str) -> Option<Arc<Collection>> {
        self.collections.get(key)
    }

    /// Every subcollection, order unspecified.
    pub fn collections(&self) -> Vec<Arc<Collection>> {
        self.collections.values()
    }

    /// Remove the subcollection under `key`. No-op if absent.
    pub fn delete_collection(&self, key: &str) {
        self.collections.delete(key);
    }

    /// Names of all documents, sorted.
    pub fn document_names(&self) -> Vec<String> {
        let mut names = self.documents.keys();
        names.sort();
        names
    }

    /// Names of all subcollections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.keys();
        names.sort();
        names
    }

    pub(crate) fn document_entries(&self) -> Vec<(String, Arc<Document>)> {
        self.documents.snapshot()
    }

    pub(crate) fn collection_entries(&self) -> Vec<(String, Arc<Collection>)> {
        self.collections.snapshot()
    }
}

impl CollectionReader for Collection {
    fn get(&self, key: &str) -> Option<Arc<Document>> {
        self.documents.get(key)
    }

    fn get_all(&self) -> Vec<Arc<Document>> {
        self.documents.values()
    }
}

impl CollectionWriter for Collection {
    fn set(&self, key: &str, document: Option<Arc<Document>>) -> StoreResult<()> {
        let document = document.ok_or_else(|| StoreError::NilDocument {
            key: key.to_string(),
        })?;
        self.documents.set(key.to_string(), document);
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.documents.delete(key);
    }
}
