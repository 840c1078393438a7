#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};
use stow_core::StorageHandle;
use stow_core::storage::MemoryStorage;
use stow_runtime::persist::codec::{read_and_merge, try_read_and_merge};

// Arbitrary stored text must never panic the loader, and any failure must
// leave the current value untouched.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let storage = StorageHandle::new(MemoryStorage::new());
    if storage.set_item("k", text).is_err() {
        return;
    }
    let current = json!({"name": "default", "count": 1, "on": true});

    let merged = read_and_merge("k", &storage, current.clone());
    match try_read_and_merge("k", &storage, &current) {
        Ok(Some(expected)) => assert_eq!(merged, expected),
        Ok(None) | Err(_) => assert_eq!(merged, current),
    }
    assert!(matches!(merged, Value::Object(_)));
});
