//! Durable [`Storage`] backed by a JSON file.
//!
//! The file holds one JSON object mapping keys to stored text. It is read
//! once at [`FileStorage::open`] and rewritten in full after every mutation
//! (temp file + rename, so readers never see a torn file).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Storage;
use crate::error::Result;

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or start) the store at `path`.
    ///
    /// A missing file is an empty store. A file that is not a JSON object of
    /// strings fails with [`StorageError::Corrupt`](crate::StorageError::Corrupt).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "file storage opened");
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer(&mut file, entries)?;
            file.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply `change` to a copy of the entries, persist the copy, and only
    /// then publish it. A failed write leaves memory and disk unchanged.
    fn mutate(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut next = self.entries.borrow().clone();
        change(&mut next);
        self.persist(&next)?;
        *self.entries.borrow_mut() = next;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if !self.entries.borrow().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        self.mutate(BTreeMap::clear)
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("state.json")).unwrap();
        assert!(storage.is_empty());
        assert_eq!(storage.get_item("k").unwrap(), None);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set_item("cart", r#"{"items":[1]}"#).unwrap();
            storage.set_item("other", "x").unwrap();
            storage.remove_item("other").unwrap();
        }
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.get_item("cart").unwrap().as_deref(),
            Some(r#"{"items":[1]}"#)
        );
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn clear_empties_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("a", "1").unwrap();
        storage.clear().unwrap();
        assert!(FileStorage::open(&path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Corrupt(_))
        ));
    }
}
