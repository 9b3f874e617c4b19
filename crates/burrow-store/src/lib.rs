//! Embeddable hierarchical document store.
//!
//! Data is an in-memory tree of named collections (directories) holding
//! documents (leaves of keyed, individually encoded fields) and nested
//! collections. A [`Datastore`] binds a forest of collections to a directory
//! and maps it to and from disk.
//!
//! # Key Types
//!
//! - [`Datastore`] -- root bound to a path; [`Datastore::open`] loads,
//!   [`Datastore::flush`] / [`Datastore::close`] save
//! - [`Collection`] -- named container of documents and subcollections
//! - [`Document`] -- named bag of fields
//! - [`Item`] -- snapshot of one field, decodable into a typed value
//! - [`ConcurrentMap`] -- `RwLock`ed map underlying every node
//!
//! # Design Rules
//!
//! 1. Every node is safe to share across threads; single-key operations are
//!    atomic and the last completed write wins.
//! 2. Get-or-create accessors never lose a concurrently created child.
//! 3. Loading and flushing are fail-fast and not atomic as a whole.
//! 4. Flushing only adds and overwrites files, it never deletes them.

pub mod collection;
pub mod config;
pub mod datastore;
pub mod document;
pub mod error;
pub mod helpers;
pub mod item;
pub mod map;

// Re-export primary types at crate root for ergonomic imports.
pub use collection::{Collection, CollectionReadWriter, CollectionReader, CollectionWriter};
pub use config::{DatastoreConfig, WriteMode};
pub use datastore::{Datastore, FlushReport};
pub use document::{Document, DocumentReadWriter, DocumentReader, DocumentWriter};
pub use error::{StoreError, StoreResult};
pub use helpers::{get_set_with_default, get_with_default};
pub use item::{encode, Item};
pub use map::ConcurrentMap;

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::fs;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        zip: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Role {
        Admin,
        Member { since: u16 },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        label: String,
        weights: Vec<i32>,
        parent: Option<u64>,
    }

    fn build_tree(ds: &Datastore) {
        let users = ds.collection("users");
        let alice = users.document("alice");
        alice.set("age", &30).unwrap();
        alice.set("email", "alice@example.com").unwrap();
        alice
            .set(
                "address",
                &Address {
                    street: "1 Main St".into(),
                    zip: 12345,
                },
            )
            .unwrap();
        alice.set("role", &Role::Admin).unwrap();
        alice.set("limit", &f64::INFINITY).unwrap();

        let bob = users.document("bob");
        bob.set("age", &41).unwrap();
        bob.set("role", &Role::Member { since: 2019 }).unwrap();
        bob.set("tags", &vec!["ops", "oncall"]).unwrap();

        let archive = users.collection("archive");
        archive.document("carol").set("age", &77).unwrap();
        archive.collection("empty");

        let settings = ds.collection("settings");
        let mut limits = BTreeMap::new();
        limits.insert("max".to_string(), 10u64);
        settings.document("limits").set("values", &limits).unwrap();
    }

    fn encoded(value: &impl Serialize) -> String {
        STANDARD.encode(encode(value).unwrap())
    }

    // -----------------------------------------------------------------------
    // Disk round-trips
    // -----------------------------------------------------------------------

    #[test]
    fn close_then_open_reproduces_tree() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Datastore::open(dir.path()).unwrap();
        build_tree(&ds);
        ds.close().unwrap();

        let ds = Datastore::open(dir.path()).unwrap();
        assert_eq!(ds.collection_names(), vec!["settings", "users"]);

        let users = ds.collection("users");
        assert_eq!(users.document_names(), vec!["alice", "bob"]);
        assert_eq!(users.collection_names(), vec!["archive"]);

        let alice = users.get("alice").unwrap();
        assert_eq!(alice.get("age").decode::<i32>().unwrap(), 30);
        assert_eq!(
            alice.get("email").decode::<String>().unwrap(),
            "alice@example.com"
        );
        assert_eq!(
            alice.get("address").decode::<Address>().unwrap(),
            Address {
                street: "1 Main St".into(),
                zip: 12345
            }
        );
        assert_eq!(alice.get("role").decode::<Role>().unwrap(), Role::Admin);
        assert_eq!(alice.get("limit").decode::<f64>().unwrap(), f64::INFINITY);

        let bob = users.get("bob").unwrap();
        assert_eq!(
            bob.get("role").decode::<Role>().unwrap(),
            Role::Member { since: 2019 }
        );
        assert_eq!(
            bob.get("tags").decode::<Vec<String>>().unwrap(),
            vec!["ops", "oncall"]
        );

        let archive = users.get_collection("archive").unwrap();
        assert_eq!(archive.document_names(), vec!["carol"]);
        assert_eq!(archive.collection_names(), vec!["empty"]);
        let carol = archive.get("carol").unwrap();
        assert_eq!(carol.get("age").decode::<u8>().unwrap(), 77);

        let limits: BTreeMap<String, u64> = ds
            .collection("settings")
            .get("limits")
            .unwrap()
            .get("values")
            .decode()
            .unwrap();
        assert_eq!(limits.get("max"), Some(&10));
    }

    #[test]
    fn atomic_close_then_open_reproduces_tree() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Datastore::open_with_config(dir.path(), DatastoreConfig::atomic()).unwrap();
        build_tree(&ds);
        ds.close().unwrap();

        let ds = Datastore::open(dir.path()).unwrap();
        let bob = ds.collection("users").get("bob").unwrap();
        assert_eq!(bob.get("age").decode::<i32>().unwrap(), 41);
    }

    #[test]
    fn loads_handwritten_layout() {
        let dir = tempfile::tempdir().unwrap();
        let alice = dir.path().join("users").join("alice");
        fs::create_dir_all(&alice).unwrap();
        fs::write(alice.join("age"), encoded(&30)).unwrap();

        let ds = Datastore::open(dir.path()).unwrap();
        let mut age = 0i64;
        ds.collection("users")
            .get("alice")
            .unwrap()
            .get("age")
            .decode_into(Some(&mut age))
            .unwrap();
        assert_eq!(age, 30);
    }

    #[test]
    fn reopen_and_extend() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Datastore::open(dir.path()).unwrap();
        ds.collection("c").document("d").set("first", &1).unwrap();
        ds.close().unwrap();

        let ds = Datastore::open(dir.path()).unwrap();
        ds.collection("c").document("d").set("second", &2).unwrap();
        ds.close().unwrap();

        let ds = Datastore::open(dir.path()).unwrap();
        let d = ds.collection("c").get("d").unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.get("first").decode::<i32>().unwrap(), 1);
        assert_eq!(d.get("second").decode::<i32>().unwrap(), 2);
    }

    #[test]
    fn document_replaces_same_named_collection_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let ds = Datastore::open(dir.path()).unwrap();
        ds.collection("users").collection("alice");
        ds.flush().unwrap();

        // The empty directory gains a field file and turns into a document.
        fs::write(dir.path().join("users").join("alice").join("age"), encoded(&30)).unwrap();

        let ds = Datastore::open(dir.path()).unwrap();
        let users = ds.collection("users");
        assert!(users.get_collection("alice").is_none());
        assert!(users.get("alice").is_some());
    }

    #[test]
    fn mixed_node_fails_with_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("users").join("alice");
        fs::create_dir_all(node.join("sub")).unwrap();
        fs::write(node.join("age"), encoded(&1)).unwrap();

        let err = Datastore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }

    #[test]
    fn set_none_then_get_reports_not_found() {
        let ds = Datastore::new("unused");
        let c = ds.collection("c");
        assert!(c.set("k", None).is_err());
        assert!(c.get("k").is_none());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn arb_record() -> impl Strategy<Value = Record> {
        (
            any::<u64>(),
            ".{0,24}",
            proptest::collection::vec(any::<i32>(), 0..8),
            proptest::option::of(any::<u64>()),
        )
            .prop_map(|(id, label, weights, parent)| Record {
                id,
                label,
                weights,
                parent,
            })
    }

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    proptest! {
        #[test]
        fn set_then_decode_returns_value(key in arb_name(), record in arb_record(), x in any::<f64>()) {
            let doc = Document::new("d");
            doc.set(&key, &record).unwrap();

            let mut out = Record { id: 0, label: String::new(), weights: vec![], parent: None };
            doc.get(&key).decode_into(Some(&mut out)).unwrap();
            prop_assert_eq!(out, record);

            doc.set(&key, &x).unwrap();
            let back: f64 = doc.get(&key).decode().unwrap();
            prop_assert!(back == x || (back.is_nan() && x.is_nan()));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn disk_round_trip(
            docs in proptest::collection::btree_map(
                arb_name(),
                proptest::collection::btree_map(arb_name(), arb_record(), 1..4),
                1..4,
            )
        ) {
            let dir = tempfile::tempdir().unwrap();
            let ds = Datastore::open(dir.path()).unwrap();
            let coll = ds.collection("things");
            for (doc_name, fields) in &docs {
                let doc = coll.document(doc_name);
                for (key, record) in fields {
                    doc.set(key, record).unwrap();
                }
            }
            ds.close().unwrap();

            let ds = Datastore::open(dir.path()).unwrap();
            let coll = ds.collection("things");
            let expected_names: Vec<String> = docs.keys().cloned().collect();
            prop_assert_eq!(coll.document_names(), expected_names);
            for (doc_name, fields) in &docs {
                let doc = coll.get(doc_name).unwrap();
                let loaded: BTreeMap<String, Record> = doc
                    .get_all()
                    .into_iter()
                    .map(|item| (item.key().to_string(), item.decode().unwrap()))
                    .collect();
                prop_assert_eq!(&loaded, fields);
            }
        }
    }
}
