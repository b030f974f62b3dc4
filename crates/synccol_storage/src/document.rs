//! Document database and the storage adapter built on it.

use crate::adapter::{counter_key, decode_value, StorageAdapter};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Maximum number of attempts for a write that keeps hitting conflicts.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document key.
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision token, `<generation>-<random>`.
    #[serde(rename = "_rev")]
    pub rev: String,
    /// Stored payload.
    pub collection: Value,
}

impl Document {
    /// Returns the generation number encoded in the revision.
    pub fn generation(&self) -> u64 {
        self.rev
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or(0)
    }
}

/// A small document database with optimistic revisions.
///
/// Every write must name the revision it replaces: inserting over an
/// existing document, or updating with a stale revision, fails with
/// [`StorageError::Conflict`].
///
/// A database is either in memory or backed by `<dir>/<name>.json`.
/// After [`destroy`](DocumentDb::destroy) the handle is unusable and every
/// call returns [`StorageError::Destroyed`].
#[derive(Debug)]
pub struct DocumentDb {
    name: String,
    dir: Option<PathBuf>,
    docs: RwLock<Option<BTreeMap<String, Document>>>,
}

impl DocumentDb {
    /// Creates an empty in-memory database.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: None,
            docs: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Opens (or creates) a database stored in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// database file cannot be read. A file that does not parse is logged
    /// and the database starts empty.
    pub fn open(dir: &Path, name: impl Into<String>) -> StorageResult<Self> {
        let name = name.into();
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("{name}.json"));
        let docs = if path.exists() {
            serde_json::from_slice(&fs::read(&path)?).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt database file, starting empty");
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            name,
            dir: Some(dir.to_path_buf()),
            docs: RwLock::new(Some(docs)),
        })
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directory of a persistent database.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Returns true once the database has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.docs.read().is_none()
    }

    /// Returns the number of documents.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Destroyed`] after `destroy`.
    pub fn doc_count(&self) -> StorageResult<usize> {
        self.docs
            .read()
            .as_ref()
            .map(BTreeMap::len)
            .ok_or(StorageError::Destroyed)
    }

    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such document.
    pub fn get(&self, id: &str) -> StorageResult<Document> {
        let docs = self.docs.read();
        let docs = docs.as_ref().ok_or(StorageError::Destroyed)?;
        docs.get(id).cloned().ok_or_else(|| StorageError::NotFound {
            key: id.to_string(),
        })
    }

    /// Writes a document and returns its new revision.
    ///
    /// `rev` must be `None` for an insert and the current revision for an
    /// update.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] on a revision mismatch.
    pub fn put(&self, id: &str, collection: Value, rev: Option<&str>) -> StorageResult<String> {
        let mut guard = self.docs.write();
        let docs = guard.as_mut().ok_or(StorageError::Destroyed)?;

        let generation = match (docs.get(id), rev) {
            (None, None) => 1,
            (Some(current), Some(rev)) if current.rev == rev => current.generation() + 1,
            _ => {
                return Err(StorageError::Conflict { key: id.to_string() });
            }
        };

        let doc = Document {
            id: id.to_string(),
            rev: format!("{}-{}", generation, Uuid::new_v4().simple()),
            collection,
        };
        let new_rev = doc.rev.clone();

        let mut next = docs.clone();
        next.insert(id.to_string(), doc);
        self.persist(&next)?;
        *docs = next;

        Ok(new_rev)
    }

    /// Destroys the database, deleting its file if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn destroy(&self) -> StorageResult<()> {
        let mut docs = self.docs.write();
        if let Some(path) = self.file_path() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        *docs = None;
        Ok(())
    }

    /// Opens a fresh handle with the same name and location.
    ///
    /// # Errors
    ///
    /// See [`DocumentDb::open`].
    pub fn reopen(&self) -> StorageResult<Self> {
        match &self.dir {
            Some(dir) => Self::open(dir, self.name.clone()),
            None => Ok(Self::in_memory(self.name.clone())),
        }
    }

    fn file_path(&self) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", self.name)))
    }

    fn persist(&self, docs: &BTreeMap<String, Document>) -> StorageResult<()> {
        let Some(path) = self.file_path() else {
            return Ok(());
        };

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(docs)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// A storage adapter storing every key as a document of a [`DocumentDb`].
///
/// Each document holds the value in its `collection` field; a string held
/// there is decoded on read like any other stored text. Writes look up
/// the current revision first: without one they insert, with one they
/// update against it. A write that loses a race re-reads the revision and
/// tries again, up to three attempts.
///
/// [`reset`](StorageAdapter::reset) destroys the database and swaps in a
/// freshly created handle.
#[derive(Debug)]
pub struct DocumentStore {
    name: String,
    db: RwLock<Arc<DocumentDb>>,
}

impl DocumentStore {
    /// Creates an adapter over an existing database.
    pub fn new(db: DocumentDb) -> Self {
        Self {
            name: db.name().to_string(),
            db: RwLock::new(Arc::new(db)),
        }
    }

    /// Creates an adapter over a new in-memory database.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(DocumentDb::in_memory(name))
    }

    /// Creates an adapter over a database stored in `dir`.
    ///
    /// # Errors
    ///
    /// See [`DocumentDb::open`].
    pub fn open(dir: &Path, name: impl Into<String>) -> StorageResult<Self> {
        Ok(Self::new(DocumentDb::open(dir, name)?))
    }

    /// Returns the current database handle.
    pub fn db(&self) -> Arc<DocumentDb> {
        Arc::clone(&self.db.read())
    }

    fn put_value(&self, key: &str, value: Value) -> StorageResult<()> {
        self.put_value_with(key, value, |_, _| {})
    }

    /// Writes `value`, calling `between(db, attempt)` after each revision
    /// read and before the matching write.
    fn put_value_with(
        &self,
        key: &str,
        value: Value,
        mut between: impl FnMut(&DocumentDb, u32),
    ) -> StorageResult<()> {
        let db = self.db();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let rev = match db.get(key) {
                Ok(doc) => Some(doc.rev),
                Err(StorageError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            between(&db, attempt);

            match db.put(key, value.clone(), rev.as_deref()) {
                Ok(new_rev) => {
                    debug!(key, rev = %new_rev, "document written");
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(key, attempt, "document write conflict, re-reading revision");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for DocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reset(&self) -> StorageResult<()> {
        let current = self.db();
        current.destroy()?;
        let fresh = current.reopen()?;
        *self.db.write() = Arc::new(fresh);
        debug!(name = current.name(), "document database recreated");
        Ok(())
    }

    async fn set(&self, key: &str, value: Value, counter: Option<u64>) -> StorageResult<Value> {
        match counter {
            Some(counter) => {
                let counter_key = counter_key(key);
                let (value_write, counter_write) = futures::join!(
                    async { self.put_value(key, value.clone()) },
                    async { self.put_value(&counter_key, Value::from(counter)) },
                );
                value_write?;
                counter_write?;
            }
            None => self.put_value(key, value.clone())?,
        }
        Ok(value)
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        match self.db().get(key) {
            Ok(doc) => Ok(Some(match doc.collection {
                Value::String(raw) => decode_value(raw),
                other => other,
            })),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
