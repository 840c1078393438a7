//! Deciding which storage events concern a channel.
//!
//! A channel listens to one key in one store. An event is relevant only when
//! it comes from that exact store object (identity, not kind), names that
//! key, and actually changes the stored text. A missing or empty new value
//! means the key was cleared; it decodes as `{}` so a merge downstream
//! asserts nothing new.

use serde_json::Value;
use stow_core::{StorageEvent, StorageHandle};
use tracing::{trace, warn};

use super::UpdateHandler;
use super::error::SyncError;
use crate::reactive::Observable;

/// Text substituted for a cleared key.
pub const EMPTY_OBJECT: &str = "{}";

/// Relevance test and payload decoder for one `(key, store)` channel.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    key: String,
    storage: StorageHandle,
}

impl ChangeFilter {
    pub fn new(key: impl Into<String>, storage: StorageHandle) -> Self {
        Self {
            key: key.into(),
            storage,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    /// Whether `event` concerns this channel.
    #[must_use]
    pub fn accepts(&self, event: &StorageEvent) -> bool {
        let same_store = event
            .origin
            .as_ref()
            .is_some_and(|origin| origin.same_store(&self.storage));
        if !same_store {
            trace!(key = %self.key, "storage event from another store");
            return false;
        }
        if event.key.as_deref() != Some(self.key.as_str()) {
            trace!(key = %self.key, event_key = event.key.as_deref(), "storage event for another key");
            return false;
        }
        if event.new_value == event.old_value {
            trace!(key = %self.key, "storage event without change");
            return false;
        }
        true
    }

    /// The decoded new value of a relevant event.
    ///
    /// Returns `None` for irrelevant events and for undecodable payloads,
    /// which are logged.
    #[must_use]
    pub fn decode(&self, event: &StorageEvent) -> Option<Value> {
        if !self.accepts(event) {
            return None;
        }
        let text = match event.new_value.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => EMPTY_OBJECT,
        };
        match serde_json::from_str(text) {
            Ok(value) => Some(value),
            Err(source) => {
                let err = SyncError::Decode {
                    key: self.key.clone(),
                    source,
                };
                warn!(key = %self.key, error = %err, "ignoring undecodable storage event");
                None
            }
        }
    }

    /// A listener that forwards relevant events to `on_update` with
    /// `target`.
    pub fn into_listener<T: 'static>(
        self,
        on_update: UpdateHandler<T>,
        target: Observable<T>,
    ) -> impl Fn(&StorageEvent) + 'static {
        move |event: &StorageEvent| {
            if let Some(decoded) = self.decode(event) {
                on_update(decoded, &target);
            }
        }
    }
}

/// Build the storage event listener for `(key, storage)`.
pub fn storage_event_handler<T: 'static>(
    key: impl Into<String>,
    storage: StorageHandle,
    on_update: UpdateHandler<T>,
    target: Observable<T>,
) -> impl Fn(&StorageEvent) + 'static {
    ChangeFilter::new(key, storage).into_listener(on_update, target)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;
    use stow_core::storage::MemoryStorage;

    use super::*;

    type Calls = Rc<RefCell<Vec<(Value, bool)>>>;

    struct Fixture {
        store: StorageHandle,
        value: Observable<Value>,
        calls: Calls,
        listener: Box<dyn Fn(&StorageEvent)>,
    }

    fn fixture() -> Fixture {
        let store = StorageHandle::new(MemoryStorage::new());
        let value = Observable::new(json!({"foo": "bar"}));
        let calls: Calls = Rc::default();
        let sink = Rc::clone(&calls);
        let expected = value.clone();
        let on_update: UpdateHandler<Value> = Rc::new(move |decoded: Value, target: &Observable<Value>| {
            sink.borrow_mut().push((decoded, target.ptr_eq(&expected)));
        });
        let listener = storage_event_handler("key", store.clone(), on_update, value.clone());
        Fixture {
            store,
            value,
            calls,
            listener: Box::new(listener),
        }
    }

    #[test]
    fn forwards_matching_event() {
        let f = fixture();
        (f.listener)(&StorageEvent::new(&f.store, "key").with_new_value(r#"{"foo":"bar2"}"#));
        assert_eq!(*f.calls.borrow(), vec![(json!({"foo": "bar2"}), true)]);
        // The filter only forwards; the handler decides what to apply.
        assert_eq!(f.value.get(), json!({"foo": "bar"}));
    }

    #[test]
    fn ignores_other_key() {
        let f = fixture();
        (f.listener)(&StorageEvent::new(&f.store, "another key").with_new_value(r#"{"foo":"x"}"#));
        assert!(f.calls.borrow().is_empty());
    }

    #[test]
    fn ignores_other_store_even_with_same_contents() {
        let f = fixture();
        let other = StorageHandle::new(MemoryStorage::new());
        (f.listener)(&StorageEvent::new(&other, "key").with_new_value(r#"{"foo":"x"}"#));
        assert!(f.calls.borrow().is_empty());
    }

    #[test]
    fn ignores_event_without_origin() {
        let f = fixture();
        let event = StorageEvent {
            key: Some("key".into()),
            new_value: Some("{}".into()),
            ..StorageEvent::default()
        };
        (f.listener)(&event);
        assert!(f.calls.borrow().is_empty());
    }

    #[test]
    fn ignores_unchanged_value() {
        let f = fixture();
        let text = r#"{"foo":"bar2"}"#;
        (f.listener)(
            &StorageEvent::new(&f.store, "key")
                .with_old_value(text)
                .with_new_value(text),
        );
        assert!(f.calls.borrow().is_empty());
    }

    #[test]
    fn forwards_changed_value() {
        let f = fixture();
        (f.listener)(
            &StorageEvent::new(&f.store, "key")
                .with_old_value(r#"{"foo":"bar"}"#)
                .with_new_value(r#"{"foo":"bar2"}"#),
        );
        assert_eq!(f.calls.borrow().len(), 1);
    }

    #[test]
    fn missing_new_value_forwards_empty_object() {
        let f = fixture();
        (f.listener)(&StorageEvent::new(&f.store, "key").with_old_value(r#"{"foo":"bar"}"#));
        assert_eq!(*f.calls.borrow(), vec![(json!({}), true)]);
    }

    #[test]
    fn empty_new_value_forwards_empty_object() {
        let f = fixture();
        (f.listener)(
            &StorageEvent::new(&f.store, "key")
                .with_old_value(r#"{"foo":"bar"}"#)
                .with_new_value(""),
        );
        assert_eq!(*f.calls.borrow(), vec![(json!({}), true)]);
    }

    #[test]
    fn undecodable_payload_is_skipped() {
        let f = fixture();
        (f.listener)(&StorageEvent::new(&f.store, "key").with_new_value("{broken"));
        assert!(f.calls.borrow().is_empty());
        // The listener stays usable afterwards.
        (f.listener)(&StorageEvent::new(&f.store, "key").with_new_value("{}"));
        assert_eq!(f.calls.borrow().len(), 1);
    }

    #[test]
    fn accepts_and_decode_agree() {
        let store = StorageHandle::new(MemoryStorage::new());
        let filter = ChangeFilter::new("k", store.clone());
        assert_eq!(filter.key(), "k");
        assert!(filter.storage().same_store(&store));
        let cleared = StorageEvent::cleared(&store);
        assert!(!filter.accepts(&cleared));
        assert_eq!(filter.decode(&cleared), None);
        let set = StorageEvent::new(&store, "k").with_new_value("[1]");
        assert!(filter.accepts(&set));
        assert_eq!(filter.decode(&set), Some(json!([1])));
    }
}
