//! Encoding values to stored text and merging stored text back in.
//!
//! Stored text is the JSON encoding of the whole value. Reads merge the
//! stored object into the current value field by field rather than replacing
//! it, so fields the stored copy lacks keep their current values.
//!
//! Two merge policies exist:
//!
//! - [`merge_truthy`] (initial load): a falsy stored field (`null`, `false`,
//!   `0`, `""`) does not overwrite a truthy current field.
//! - [`assign`] (external updates): every stored field overwrites.
//!
//! The swallowing entry points ([`write_item`], [`read_and_merge`],
//! [`assign_into`]) log failures and fall back to the current value; the
//! `try_` variants return [`SyncError`] for callers that want to see it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use stow_core::StorageHandle;
use tracing::{debug, warn};

use super::error::{Result, SyncError};
use crate::reactive::Observable;

/// JavaScript-style truthiness of a JSON value.
///
/// Arrays and objects are truthy even when empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Merge `source` into `target`, keeping truthy target fields that the
/// source would set to a falsy value.
///
/// A target that is not an object is replaced by an empty one first.
pub fn merge_truthy(target: &mut Value, source: Map<String, Value>) {
    let mut merged = take_object(target);
    for (key, incoming) in source {
        let keep_existing = !is_truthy(&incoming) && merged.get(&key).is_some_and(is_truthy);
        if !keep_existing {
            merged.insert(key, incoming);
        }
    }
    *target = Value::Object(merged);
}

/// Overwrite every field of `target` that `source` carries.
///
/// A non-object `source` carries no fields and changes nothing.
pub fn assign(target: &mut Value, source: Value) {
    let Value::Object(source) = source else {
        return;
    };
    let mut merged = take_object(target);
    merged.extend(source);
    *target = Value::Object(merged);
}

/// Move the fields out of `value`, leaving `null`. Non-objects yield none.
fn take_object(value: &mut Value) -> Map<String, Value> {
    match std::mem::take(value) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Encode `value` as stored text.
pub fn encode_item<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| SyncError::Encode {
        key: key.to_owned(),
        source,
    })
}

/// Encode `value` and write it at `key`.
pub fn try_write_item<T: Serialize + ?Sized>(
    key: &str,
    value: &T,
    storage: &StorageHandle,
) -> Result<()> {
    let text = encode_item(key, value)?;
    store_text(key, &text, storage)
}

fn store_text(key: &str, text: &str, storage: &StorageHandle) -> Result<()> {
    storage
        .set_item(key, text)
        .map_err(|source| SyncError::Write {
            key: key.to_owned(),
            source,
        })
}

/// Encode `value` and write it at `key`, logging any failure.
///
/// Returns whether the write happened. There is no retry.
pub fn write_item<T: Serialize + ?Sized>(key: &str, value: &T, storage: &StorageHandle) -> bool {
    write_encoded(key, encode_item(key, value), storage)
}

/// Write text produced by [`encode_item`], logging any failure.
///
/// Lets callers encode under a borrow and write after releasing it, since a
/// write can synchronously notify listeners in other contexts.
pub fn write_encoded(key: &str, encoded: Result<String>, storage: &StorageHandle) -> bool {
    match encoded.and_then(|text| store_text(key, &text, storage)) {
        Ok(()) => {
            debug!(key, "value persisted");
            true
        }
        Err(err) => {
            warn!(key, error = %err, "unable to write to storage");
            false
        }
    }
}

/// Read and decode the value stored at `key`.
///
/// Absent and empty text both mean "nothing stored".
pub fn read_item(key: &str, storage: &StorageHandle) -> Result<Option<Value>> {
    let raw = storage.get_item(key).map_err(|source| SyncError::Read {
        key: key.to_owned(),
        source,
    })?;
    match raw {
        Some(text) if !text.is_empty() => serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| SyncError::Decode {
                key: key.to_owned(),
                source,
            }),
        _ => Ok(None),
    }
}

/// Merge the stored value at `key` into `current` with [`merge_truthy`].
///
/// Returns `Ok(None)` when nothing is stored.
pub fn try_read_and_merge<T>(key: &str, storage: &StorageHandle, current: &T) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned,
{
    let Some(stored) = read_item(key, storage)? else {
        return Ok(None);
    };
    let Value::Object(stored) = stored else {
        return Err(SyncError::NotAnObject {
            key: key.to_owned(),
        });
    };
    let mut merged = serde_json::to_value(current).map_err(|source| SyncError::Encode {
        key: key.to_owned(),
        source,
    })?;
    merge_truthy(&mut merged, stored);
    serde_json::from_value(merged)
        .map(Some)
        .map_err(|source| SyncError::Incompatible {
            key: key.to_owned(),
            source,
        })
}

/// Merge the stored value at `key` into `current`.
///
/// Any failure is logged and `current` comes back unchanged.
pub fn read_and_merge<T>(key: &str, storage: &StorageHandle, current: T) -> T
where
    T: Serialize + DeserializeOwned,
{
    match try_read_and_merge(key, storage, &current) {
        Ok(Some(merged)) => merged,
        Ok(None) => {
            debug!(key, "nothing stored");
            current
        }
        Err(err) => {
            warn!(key, error = %err, "unable to read from storage");
            current
        }
    }
}

/// `current` with every field of `decoded` assigned over it.
pub fn try_assign<T>(current: &T, decoded: Value) -> serde_json::Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(current)?;
    assign(&mut merged, decoded);
    serde_json::from_value(merged)
}

/// Default handler for external updates: [`assign`] the decoded fields onto
/// the observable's value.
///
/// A result that does not fit `T` is logged and dropped.
pub fn assign_into<T>(decoded: Value, target: &Observable<T>)
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    match target.with(|current| try_assign(current, decoded)) {
        Ok(next) => target.set(next),
        Err(err) => warn!(error = %err, "external update does not fit value type"),
    }
}
