//! Property-based invariant tests for the storage backends and the
//! notification fan-out of shared areas.
//!
//! 1. A quota-limited store never holds more bytes than its quota, and a
//!    rejected write leaves it unchanged.
//! 2. Every content-changing write through one view of a shared area is
//!    reported exactly once to every other view and never to the writer.
//! 3. Delivered events carry the receiving view as origin and the exact
//!    before/after text.
//! 4. The capability probe leaves no entry behind.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use stow_core::storage::{MemoryStorage, SharedArea, Storage};
use stow_core::{StorageAccessor, StorageEvent, StorageEvents, StorageHandle, StorageKind};

#[derive(Debug, Clone)]
enum Op {
    Set { view: usize, key: String, value: String },
    Remove { view: usize, key: String },
    Clear { view: usize },
}

fn op_strategy(views: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..views, "[a-c]", "[x-z]{0,3}").prop_map(|(view, key, value)| Op::Set { view, key, value }),
        2 => (0..views, "[a-c]").prop_map(|(view, key)| Op::Remove { view, key }),
        1 => (0..views).prop_map(|view| Op::Clear { view }),
    ]
}

type Inbox = Rc<RefCell<Vec<StorageEvent>>>;

proptest! {
    #[test]
    fn quota_is_never_exceeded(
        limit in 0usize..40,
        writes in prop::collection::vec(("[a-d]{1,3}", "[a-z]{0,12}"), 0..30),
    ) {
        let storage = MemoryStorage::with_quota(limit);
        for (key, value) in writes {
            let before = storage.used_bytes();
            let previous = storage.get_item(&key).unwrap();
            match storage.set_item(&key, &value) {
                Ok(()) => prop_assert_eq!(storage.get_item(&key).unwrap(), Some(value)),
                Err(err) => {
                    prop_assert!(err.is_quota_exceeded());
                    prop_assert_eq!(storage.used_bytes(), before);
                    prop_assert_eq!(storage.get_item(&key).unwrap(), previous);
                }
            }
            prop_assert!(storage.used_bytes() <= limit);
        }
    }

    #[test]
    fn shared_area_fans_out_to_peers_only(ops in prop::collection::vec(op_strategy(3), 0..40)) {
        let area = SharedArea::new();
        let mut handles = Vec::new();
        let mut inboxes: Vec<Inbox> = Vec::new();
        // Hubs must outlive the test body; views only hold them weakly.
        let mut hubs = Vec::new();
        for _ in 0..3 {
            let hub = Rc::new(StorageEvents::new());
            let inbox: Inbox = Rc::default();
            let sink = Rc::clone(&inbox);
            hub.add_listener(move |event: &StorageEvent| sink.borrow_mut().push(event.clone()));
            handles.push(area.attach(&hub));
            inboxes.push(inbox);
            hubs.push(hub);
        }

        for op in ops {
            for inbox in &inboxes {
                inbox.borrow_mut().clear();
            }
            let (writer, key, old, new, changed) = match &op {
                Op::Set { view, key, value } => {
                    let old = handles[*view].get_item(key).unwrap();
                    handles[*view].set_item(key, value).unwrap();
                    let changed = old.as_deref() != Some(value.as_str());
                    (*view, Some(key.clone()), old, Some(value.clone()), changed)
                }
                Op::Remove { view, key } => {
                    let old = handles[*view].get_item(key).unwrap();
                    handles[*view].remove_item(key).unwrap();
                    let changed = old.is_some();
                    (*view, Some(key.clone()), old, None, changed)
                }
                Op::Clear { view } => {
                    let changed = !handles[*view].is_empty();
                    handles[*view].clear().unwrap();
                    (*view, None, None, None, changed)
                }
            };

            for (index, inbox) in inboxes.iter().enumerate() {
                let inbox = inbox.borrow();
                if index == writer || !changed {
                    prop_assert!(inbox.is_empty(), "view {} got {:?} for {:?}", index, inbox, op);
                    continue;
                }
                prop_assert_eq!(inbox.len(), 1);
                let event = &inbox[0];
                prop_assert!(event.origin.as_ref().unwrap().same_store(&handles[index]));
                prop_assert_eq!(&event.key, &key);
                prop_assert_eq!(&event.old_value, &old);
                prop_assert_eq!(&event.new_value, &new);
            }
        }
    }

    #[test]
    fn probe_leaves_no_trace(entries in prop::collection::btree_map("[a-d]", "[a-z]{1,4}", 0..4)) {
        let backend = Rc::new(MemoryStorage::new());
        for (key, value) in &entries {
            backend.set_item(key, value).unwrap();
        }
        let accessor = StorageAccessor::new().with_primary(StorageHandle::from_rc(backend.clone()));
        prop_assert!(accessor.is_available(StorageKind::Primary));
        prop_assert_eq!(backend.len(), entries.len());
    }
}
