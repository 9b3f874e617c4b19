//! The root of the tree and its directory mapping.
//!
//! On-disk layout:
//! ```text
//! <root>/
//!   <collection>/            one directory per top-level collection
//!     <collection>/          collections nest freely
//!       <document>/          a directory holding only files is a document
//!         <field>            file content = base64(encoded field bytes)
//! ```
//!
//! A directory is a document or a collection, never both: one holding files
//! and subdirectories is rejected on load. Only directories may appear at
//! the root.

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::collection::Collection;
use crate::config::{DatastoreConfig, WriteMode};
use crate::error::{StoreError, StoreResult};
use crate::map::ConcurrentMap;

/// Counts of nodes written by one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub collections: usize,
    pub documents: usize,
    pub fields: usize,
}

/// A forest of collections bound to a directory.
///
/// The datastore holds collections only; documents always live inside a
/// collection.
#[derive(Debug)]
pub struct Datastore {
    path: PathBuf,
    config: DatastoreConfig,
    collections: ConcurrentMap<String, Arc<Collection>>,
    flush_lock: Mutex<()>,
}

/// One immediate child of a directory.
struct DirEntry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

impl Datastore {
    /// Create an empty datastore bound to `path` without touching the disk.
    ///
    /// `path` is cleaned lexically (see [`clean_path`]). Most callers want
    /// [`Datastore::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, DatastoreConfig::default())
    }

    /// Like [`Datastore::new`] with an explicit configuration.
    pub fn with_config(path: impl Into<PathBuf>, config: DatastoreConfig) -> Self {
        Self {
            path: clean_path(&path.into()),
            config,
            collections: ConcurrentMap::new(),
            flush_lock: Mutex::new(()),
        }
    }

    /// Load the datastore at `path`, creating the directory if missing.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with_config(path, DatastoreConfig::default())
    }

    /// Like [`Datastore::open`] with an explicit configuration.
    pub fn open_with_config(path: impl Into<PathBuf>, config: DatastoreConfig) -> StoreResult<Self> {
        let datastore = Self::with_config(path, config);
        datastore.load()?;
        Ok(datastore)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    /// Return the top-level collection `name`, creating it if absent.
    pub fn collection(&self, name: &str) -> Arc<Collection> {
        self.collections
            .get_or_insert_with(name.to_string(), || Arc::new(Collection::new(name)))
    }

    /// The top-level collection `name`, if any.
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name)
    }

    /// Drop the top-level collection `name` from memory. Its directory is
    /// left on disk.
    pub fn delete_collection(&self, name: &str) {
        self.collections.delete(name);
    }

    /// Every top-level collection, order unspecified.
    pub fn collections(&self) -> Vec<Arc<Collection>> {
        self.collections.values()
    }

    /// Names of the top-level collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.keys();
        names.sort();
        names
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Read the directory tree under [`Datastore::path`] into memory.
    ///
    /// A missing root is created and yields an empty datastore. Loading stops
    /// at the first error; whatever was read before it stays in the tree.
    pub fn load(&self) -> StoreResult<()> {
        let root = self.path.as_path();
        match fs::metadata(root) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.create_dir(root)?;
                info!(path = %root.display(), "created empty datastore");
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(root, e)),
            Ok(meta) if !meta.is_dir() => {
                warn!(path = %root.display(), "datastore root is not a directory");
                return Err(StoreError::invalid_path(root, "datastore root is not a directory"));
            }
            Ok(_) => {}
        }

        for entry in read_entries(root)? {
            if !entry.is_dir {
                warn!(path = %entry.path.display(), "file found at datastore root");
                return Err(StoreError::invalid_path(
                    &entry.path,
                    "only collections may be stored at the datastore root",
                ));
            }
            let collection = self.collection(&entry.name);
            load_node(&entry.path, &collection, None)?;
        }

        info!(
            path = %root.display(),
            collections = self.collections.len(),
            "datastore loaded"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    /// Write the in-memory tree to disk.
    ///
    /// Only one flush runs at a time. Application writes are not blocked, so
    /// a flush racing with mutations may persist a mix of old and new data.
    /// Files for fields that no longer exist in memory are left in place.
    /// A document without fields is written as an empty directory and so
    /// loads back as an empty collection.
    ///
    /// Every collection, document and field name must be a single normal
    /// path component; anything else (`..`, `a/b`, an absolute path, the
    /// empty string) fails with [`StoreError::InvalidPath`]. The first error
    /// aborts the flush; files already written stay written.
    pub fn flush(&self) -> StoreResult<FlushReport> {
        let _guard = self.flush_lock.lock().expect("flush lock poisoned");
        let mut report = FlushReport::default();

        for (name, collection) in self.collections.snapshot() {
            self.flush_collection(&child_path(&self.path, &name)?, &collection, &mut report)?;
        }

        info!(
            path = %self.path.display(),
            collections = report.collections,
            documents = report.documents,
            fields = report.fields,
            "datastore flushed"
        );
        Ok(report)
    }

    /// Flush the tree and release the datastore.
    pub fn close(self) -> StoreResult<()> {
        self.flush().map(|_| ())
    }

    fn flush_collection(
        &self,
        dir: &Path,
        collection: &Collection,
        report: &mut FlushReport,
    ) -> StoreResult<()> {
        self.create_dir(dir)?;
        report.collections += 1;

        for (doc_name, document) in collection.document_entries() {
            let doc_dir = child_path(dir, &doc_name)?;
            self.create_dir(&doc_dir)?;
            let fields = document.raw_fields();
            for (key, bytes) in &fields {
                let field_path = child_path(&doc_dir, key)?;
                self.write_field(&field_path, STANDARD.encode(bytes).as_bytes())?;
            }
            debug!(path = %doc_dir.display(), fields = fields.len(), "flushed document");
            report.documents += 1;
            report.fields += fields.len();
        }

        for (sub_name, sub) in collection.collection_entries() {
            self.flush_collection(&child_path(dir, &sub_name)?, &sub, report)?;
        }
        Ok(())
    }

    fn create_dir(&self, dir: &Path) -> StoreResult<()> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.config.dir_mode);
        }
        builder.create(dir).map_err(|e| StoreError::io(dir, e))
    }

    fn write_field(&self, path: &Path, contents: &[u8]) -> StoreResult<()> {
        match self.config.write_mode {
            WriteMode::Overwrite => {
                let mut options = OpenOptions::new();
                options.write(true).create(true).truncate(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    options.mode(self.config.file_mode);
                }
                let mut file = options.open(path).map_err(|e| StoreError::io(path, e))?;
                file.write_all(contents).map_err(|e| StoreError::io(path, e))?;
                if self.config.sync_on_flush {
                    file.sync_all().map_err(|e| StoreError::io(path, e))?;
                }
            }
            WriteMode::Atomic => {
                let dir = path.parent().unwrap_or(&self.path);
                let mut tmp =
                    tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
                tmp.write_all(contents).map_err(|e| StoreError::io(tmp.path(), e))?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    tmp.as_file()
                        .set_permissions(fs::Permissions::from_mode(self.config.file_mode))
                        .map_err(|e| StoreError::io(tmp.path(), e))?;
                }
                if self.config.sync_on_flush {
                    tmp.as_file()
                        .sync_all()
                        .map_err(|e| StoreError::io(tmp.path(), e))?;
                }
                tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
            }
        }
        Ok(())
    }
}

/// Lexically normalize `path`: drop `.` segments, fold `..` into the
/// preceding segment where there is one, and map an empty result to `.`.
///
/// The filesystem is not consulted, so symlinks are not resolved.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Join `name` onto `base`, requiring it to be exactly one normal component.
fn child_path(base: &Path, name: &str) -> StoreResult<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(base.join(name)),
        _ => {
            warn!(base = %base.display(), name, "refusing to flush a name that is not a single path component");
            Err(StoreError::invalid_path(
                base,
                format!("{name:?} is not a single path component"),
            ))
        }
    }
}

/// Load one directory below the root into `node`.
///
/// `parent` is the collection holding `node`; it is `None` for top-level
/// collections, which may not turn out to be documents.
fn load_node(path: &Path, node: &Collection, parent: Option<&Collection>) -> StoreResult<()> {
    let entries = read_entries(path)?;
    let has_files = entries.iter().any(|e| !e.is_dir);
    let has_dirs = entries.iter().any(|e| e.is_dir);

    match (has_files, has_dirs) {
        (true, true) => {
            warn!(path = %path.display(), "directory holds both files and subdirectories");
            Err(StoreError::invalid_path(
                path,
                "a directory cannot be both a document and a collection",
            ))
        }
        (true, false) => {
            let parent = parent.ok_or_else(|| {
                warn!(path = %path.display(), "document found at datastore root");
                StoreError::invalid_path(path, "documents cannot be stored at the datastore root")
            })?;

            parent.delete_collection(node.name());
            let document = parent.document(node.name());
            for entry in &entries {
                let raw = fs::read(&entry.path).map_err(|e| StoreError::io(&entry.path, e))?;
                let bytes = decode_field(&raw).map_err(|source| StoreError::Base64 {
                    path: entry.path.clone(),
                    source,
                })?;
                document.raw_set(entry.name.clone(), bytes);
            }
            debug!(path = %path.display(), fields = entries.len(), "loaded document");
            Ok(())
        }
        (false, true) => {
            for entry in &entries {
                let child = node.collection(&entry.name);
                load_node(&entry.path, &child, Some(node))?;
            }
            debug!(path = %path.display(), children = entries.len(), "loaded collection");
            Ok(())
        }
        (false, false) => {
            debug!(path = %path.display(), "loaded empty collection");
            Ok(())
        }
    }
}

/// Base64-decode a field file, ignoring line breaks.
fn decode_field(raw: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| *b != b'\n' && *b != b'\r')
        .collect();
    STANDARD.decode(compact)
}

/// Immediate children of `dir`, sorted by name.
fn read_entries(dir: &Path) -> StoreResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| StoreError::io(&path, e))?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| StoreError::invalid_path(&path, "entry name is not valid UTF-8"))?;
        entries.push(DirEntry {
            name,
            path,
            is_dir: file_type.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
