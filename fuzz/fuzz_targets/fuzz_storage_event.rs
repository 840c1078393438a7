#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};
use stow_core::{Host, LabClock, StorageEvent, StorageKind};
use stow_runtime::{StoredObservable, StoredObservableOptions};

#[derive(Arbitrary, Debug)]
struct FuzzEvent {
    own_store: bool,
    key: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
}

// Any notification sequence leaves the listener alive and the value an
// object; foreign stores never change it.
fuzz_target!(|events: Vec<FuzzEvent>| {
    let host = Host::lab(&LabClock::new());
    let primary = host.storage().handle(StorageKind::Primary).cloned().unwrap();
    let session = host.storage().handle(StorageKind::Session).cloned().unwrap();
    let engine = StoredObservable::create(&host, StoredObservableOptions::new("k", json!({"v": 0})));
    let hub = host.events().unwrap();

    for input in events.into_iter().take(64) {
        let before = engine.value().get();
        let origin = if input.own_store { &primary } else { &session };
        let event = StorageEvent {
            origin: Some(origin.clone()),
            key: input.key,
            old_value: input.old_value,
            new_value: input.new_value,
        };
        hub.dispatch(&event);
        if !input.own_store {
            assert_eq!(engine.value().get(), before);
        }
        assert!(matches!(engine.value().get(), Value::Object(_)));
    }
    assert_eq!(hub.listener_count(), 1);
    host.scheduler().run_until_idle();
});
