use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use voco::history::{HistoryStore, MAX_ENTRIES};
use voco::storage::{FileStore, MemoryStore};

fn memory_store() -> HistoryStore {
    HistoryStore::new(Arc::new(MemoryStore::new()))
}

fn phrases() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}( [a-z]{1,6})?", 0..70)
}

proptest! {
    #[test]
    fn append_puts_text_first(existing in phrases(), text in "[a-zñ ]{0,4}[a-z]") {
        let store = memory_store();
        for p in &existing {
            store.append(p).unwrap();
        }
        store.append(&text).unwrap();

        let list = store.list();
        prop_assert_eq!(&list[0].text, &text);
        prop_assert_eq!(list.iter().filter(|e| e.text == text).count(), 1);
        prop_assert!(list.len() <= MAX_ENTRIES);
    }

    #[test]
    fn list_is_unique_and_capped(existing in phrases()) {
        let store = memory_store();
        for p in &existing {
            store.append(p).unwrap();
        }
        let list = store.list();
        prop_assert!(list.len() <= MAX_ENTRIES);
        for (i, entry) in list.iter().enumerate() {
            prop_assert!(list[i + 1..].iter().all(|e| e.text != entry.text));
        }
    }

    #[test]
    fn remove_out_of_range_is_noop(existing in phrases(), past_end in 0usize..1000) {
        let store = memory_store();
        for p in &existing {
            store.append(p).unwrap();
        }
        let before = store.list();
        store.remove(before.len() + past_end).unwrap();
        prop_assert_eq!(store.list(), before);
    }

    #[test]
    fn replace_with_own_list_is_noop(existing in phrases()) {
        let store = memory_store();
        for p in &existing {
            store.append(p).unwrap();
        }
        let before = store.list();
        store.replace(&serde_json::to_value(&before).unwrap()).unwrap();
        prop_assert_eq!(store.list(), before);
    }
}

#[test]
fn test_fifty_one_appends_evict_oldest() {
    let store = memory_store();
    for i in 0..=MAX_ENTRIES {
        store.append(&format!("phrase {}", i)).unwrap();
    }
    let list = store.list();
    assert_eq!(list.len(), MAX_ENTRIES);
    assert_eq!(list[0].text, format!("phrase {}", MAX_ENTRIES));
    assert_eq!(list[MAX_ENTRIES - 1].text, "phrase 1");
}

#[test]
fn test_replace_rejects_non_list() {
    let store = memory_store();
    store.append("keep").unwrap();
    let before = store.list();

    for bad in [json!({"0": {"text": "x"}}), json!("x"), json!(true), json!([1, 2])] {
        assert!(store.replace(&bad).is_err(), "{bad} should be rejected");
        assert_eq!(store.list(), before);
    }
}

#[test]
fn test_history_survives_restart() {
    let dir = tempdir().unwrap();
    {
        let store = HistoryStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        store.append("hello").unwrap();
        store.append("world").unwrap();
        store.remove(1).unwrap();
    }
    let store = HistoryStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
    let list = store.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].text, "world");

    store.clear().unwrap();
    assert!(store.list().is_empty());
}
