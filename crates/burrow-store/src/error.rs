use std::path::PathBuf;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reserved for lookups that require the key to exist.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Decode was attempted on a field that is absent or was never set.
    #[error("cannot decode empty item {key:?}")]
    EmptyItem { key: String },

    /// Decode was given no destination to write into.
    #[error("cannot decode into missing target of type {type_name}")]
    InvalidDecode { type_name: &'static str },

    /// A filesystem node violates the collection/document layout.
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// `Collection::set` was called without a document.
    #[error("cannot insert missing document {key:?} into collection")]
    NilDocument { key: String },

    /// I/O error from the filesystem, with the path being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A field file on disk does not hold valid base64.
    #[error("field file {path} is not valid base64: {source}")]
    Base64 {
        path: PathBuf,
        #[source]
        source: base64::DecodeError,
    },

    /// The value could not be serialized.
    #[error("could not encode value: {0}")]
    Encode(#[source] ciborium::ser::Error<std::io::Error>),

    /// The stored bytes do not match the requested type.
    #[error("could not decode item {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: ciborium::de::Error<std::io::Error>,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is [`StoreError::EmptyItem`].
    pub fn is_empty_item(&self) -> bool {
        matches!(self, Self::EmptyItem { .. })
    }

    /// Returns `true` if this is [`StoreError::InvalidPath`].
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
