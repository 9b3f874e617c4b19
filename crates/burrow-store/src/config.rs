use serde::{Deserialize, Serialize};

/// How field files are written on flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Truncate and rewrite each field file in place. A crash mid-flush can
    /// leave a truncated file behind.
    #[default]
    Overwrite,
    /// Write each field to a temporary file in the document directory and
    /// rename it over the target. Each file is replaced atomically; the
    /// flush as a whole is not.
    Atomic,
}

/// Configuration for a [`Datastore`](crate::Datastore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Field file write strategy.
    pub write_mode: WriteMode,
    /// Permission bits for created directories (Unix only).
    pub dir_mode: u32,
    /// Permission bits for written field files (Unix only).
    pub file_mode: u32,
    /// `fsync` every field file after writing it.
    pub sync_on_flush: bool,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::default(),
            dir_mode: 0o700,
            file_mode: 0o600,
            sync_on_flush: false,
        }
    }
}

impl DatastoreConfig {
    /// Default configuration with atomic per-file writes.
    pub fn atomic() -> Self {
        Self {
            write_mode: WriteMode::Atomic,
            ..Self::default()
        }
    }
}
