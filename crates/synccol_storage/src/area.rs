//! Bounded key/value area backing [`super::LocalStorage`].

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A synchronous, size-bounded string key/value area.
///
/// This is the equivalent of a browser's local storage: a flat map of string
/// keys to string values with a hard size ceiling. Several
/// [`super::LocalStorage`] namespaces may share one area.
///
/// The area is either purely in memory or backed by a JSON snapshot file.
///
/// # Durability
///
/// A file-backed area rewrites its snapshot after every mutation by writing a
/// sibling temporary file and renaming it over the snapshot, so a crash
/// leaves either the old or the new snapshot.
///
/// # Thread Safety
///
/// The area is thread-safe and can be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct KeyValueArea {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
    quota: usize,
}

impl KeyValueArea {
    /// Default quota (5 MiB).
    pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

    /// Creates an empty in-memory area with the default quota.
    #[must_use]
    pub fn new() -> Self {
        Self::with_quota(Self::DEFAULT_QUOTA)
    }

    /// Creates an empty in-memory area with the given quota in bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            path: None,
            quota,
        }
    }

    /// Opens a file-backed area, loading the snapshot at `path` if it exists.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the snapshot
    /// exists but cannot be read. A snapshot that is not valid JSON is
    /// logged and replaced by an empty area.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_quota(path, Self::DEFAULT_QUOTA)
    }

    /// Opens a file-backed area with the given quota.
    ///
    /// # Errors
    ///
    /// See [`KeyValueArea::open`].
    pub fn open_with_quota(path: &Path, quota: usize) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let raw = fs::read_to_string(path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "corrupt snapshot, starting empty");
                    BTreeMap::new()
                })
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
            quota,
        })
    }

    /// Returns the snapshot path, if the area is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the quota in bytes.
    #[must_use]
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Returns the number of bytes used by keys and values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        used_bytes(&self.entries.read())
    }

    /// Returns all keys in the area, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Stores a single key/value pair.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the write would exceed the
    /// quota, or an I/O error if the snapshot cannot be written.
    pub fn set_item(&self, key: &str, value: String) -> StorageResult<()> {
        self.set_items(vec![(key.to_string(), value)])
    }

    /// Stores several pairs at once: either all of them land or none do.
    ///
    /// # Errors
    ///
    /// See [`KeyValueArea::set_item`].
    pub fn set_items(&self, items: Vec<(String, String)>) -> StorageResult<()> {
        let mut entries = self.entries.write();

        let mut needed = used_bytes(&entries);
        for (key, value) in &items {
            if let Some(old) = entries.get(key) {
                needed -= key.len() + old.len();
            }
            needed += key.len() + value.len();
        }
        if needed > self.quota {
            return Err(StorageError::QuotaExceeded {
                needed,
                quota: self.quota,
            });
        }

        let mut next = entries.clone();
        next.extend(items);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    /// Removes every key starting with `prefix`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn remove_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.retain(|key, _| !key.starts_with(prefix));

        let removed = entries.len() - next.len();
        if removed > 0 {
            self.persist(&next)?;
            *entries = next;
        }
        Ok(removed)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for KeyValueArea {
    fn default() -> Self {
        Self::new()
    }
}

fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn area_new_is_empty() {
        let area = KeyValueArea::new();
        assert_eq!(area.used_bytes(), 0);
        assert!(area.keys().is_empty());
        assert_eq!(area.quota(), KeyValueArea::DEFAULT_QUOTA);
    }

    #[test]
    fn area_set_and_get() {
        let area = KeyValueArea::new();
        area.set_item("a", "hello".into()).unwrap();
        assert_eq!(area.get_item("a").as_deref(), Some("hello"));
        assert_eq!(area.used_bytes(), 6);

        area.set_item("a", "hi".into()).unwrap();
        assert_eq!(area.used_bytes(), 3);
    }

    #[test]
    fn area_quota_rejects_and_keeps_state() {
        let area = KeyValueArea::with_quota(10);
        area.set_item("k", "12345".into()).unwrap();

        let result = area.set_items(vec![
            ("k".into(), "1".into()),
            ("other".into(), "123456".into()),
        ]);
        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));
        assert_eq!(area.get_item("k").as_deref(), Some("12345"));
        assert!(area.get_item("other").is_none());
    }

    #[test]
    fn area_overwrite_counts_only_delta() {
        let area = KeyValueArea::with_quota(10);
        area.set_item("k", "123456789".into()).unwrap();
        area.set_item("k", "987654321".into()).unwrap();
        assert_eq!(area.get_item("k").as_deref(), Some("987654321"));
    }

    #[test]
    fn area_remove_prefix() {
        let area = KeyValueArea::new();
        area.set_item("ns_a", "1".into()).unwrap();
        area.set_item("ns_counter_a", "1".into()).unwrap();
        area.set_item("other_a", "1".into()).unwrap();

        assert_eq!(area.remove_prefix("ns_").unwrap(), 2);
        assert_eq!(area.keys(), vec!["other_a".to_string()]);
        assert_eq!(area.remove_prefix("ns_").unwrap(), 0);
    }

    #[test]
    fn area_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("area.json");

        {
            let area = KeyValueArea::open(&path).unwrap();
            area.set_item("ns_users", "[1,2]".into()).unwrap();
            assert_eq!(area.path(), Some(path.as_path()));
        }

        let area = KeyValueArea::open(&path).unwrap();
        assert_eq!(area.get_item("ns_users").as_deref(), Some("[1,2]"));

        area.remove_prefix("ns_").unwrap();
        let area = KeyValueArea::open(&path).unwrap();
        assert!(area.keys().is_empty());
    }

    #[test]
    fn area_open_degrades_corrupt_snapshot_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("area.json");
        fs::write(&path, b"{broken").unwrap();

        let area = KeyValueArea::open(&path).unwrap();
        assert!(area.keys().is_empty());

        area.set_item("ns_users", "[]".into()).unwrap();
        let area = KeyValueArea::open(&path).unwrap();
        assert_eq!(area.get_item("ns_users").as_deref(), Some("[]"));
    }
}
