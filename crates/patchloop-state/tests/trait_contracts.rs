//! Trait contract tests for KeyedStore.
//!
//! Every contract runs against both the file-backed store and the in-memory
//! fake. Any conforming implementation must pass these.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use patchloop_state::{JsonFileStore, KeyedStore, MemoryStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    message: String,
    count: u32,
}

fn payload(message: &str, count: u32) -> Payload {
    Payload {
        message: message.to_string(),
        count,
    }
}

fn backends(dir: &tempfile::TempDir) -> Vec<(&'static str, Box<dyn KeyedStore<Payload>>)> {
    vec![
        (
            "json",
            Box::new(JsonFileStore::open(dir.path().join("store.json"))),
        ),
        ("memory", Box::new(MemoryStore::new())),
    ]
}

#[test]
fn overwrite_keeps_single_latest_entry() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir) {
        store.put("bad.py", payload("first", 1)).unwrap();
        store.put("bad.py", payload("second", 2)).unwrap();

        let all = store.entries().unwrap();
        assert_eq!(all.len(), 1, "{name}");
        assert_eq!(all["bad.py"], payload("second", 2), "{name}");
    }
}

#[test]
fn get_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir) {
        store.put("a.py", payload("boom", 7)).unwrap();
        let first = store.get("a.py").unwrap();
        let second = store.get("a.py").unwrap();
        assert_eq!(first, second, "{name}");
        assert_eq!(first, Some(payload("boom", 7)), "{name}");
    }
}

#[test]
fn remove_returns_value_then_absent() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir) {
        store.put("gone.py", payload("x", 0)).unwrap();
        assert_eq!(
            store.remove("gone.py").unwrap(),
            Some(payload("x", 0)),
            "{name}"
        );
        assert_eq!(store.remove("gone.py").unwrap(), None, "{name}");
        assert!(store.get("gone.py").unwrap().is_none(), "{name}");
    }
}

#[test]
fn modify_sees_full_map() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir) {
        store.put("a", payload("a", 1)).unwrap();
        store.put("b", payload("b", 2)).unwrap();

        let mut seen = 0;
        store
            .modify(&mut |map: &mut BTreeMap<String, Payload>| {
                seen = map.len();
                if let Some(b) = map.remove("b") {
                    map.insert("c".to_string(), b);
                }
            })
            .unwrap();

        assert_eq!(seen, 2, "{name}");
        let keys: Vec<String> = store.entries().unwrap().into_keys().collect();
        assert_eq!(keys, vec!["a".to_string(), "c".to_string()], "{name}");
    }
}

#[test]
fn replace_all_discards_previous_entries() {
    let dir = tempfile::tempdir().unwrap();
    for (name, store) in backends(&dir) {
        store.put("old", payload("old", 1)).unwrap();
        let mut fresh = BTreeMap::new();
        fresh.insert("new".to_string(), payload("new", 2));
        store.replace_all(fresh).unwrap();

        let all = store.entries().unwrap();
        assert_eq!(all.len(), 1, "{name}");
        assert!(all.contains_key("new"), "{name}");
    }
}

#[test]
fn concurrent_writers_do_not_lose_updates() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<JsonFileStore<Payload>> =
        Arc::new(JsonFileStore::open(dir.path().join("shared.json")));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .put(&format!("file-{i}.py"), payload("err", i))
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.entries().unwrap().len(), 8);
}
