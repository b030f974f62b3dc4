//! Live record sequences.

use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;

/// A shared, ordered sequence of records.
///
/// Every clone points at the same sequence. Reloads replace the contents in
/// place, so a handle obtained before a resync observes the new records.
pub struct Records<M> {
    inner: Arc<RwLock<Vec<M>>>,
}

impl<M> Records<M> {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Locks the sequence for reading.
    ///
    /// Do not hold the guard across an `.await`.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<M>> {
        self.inner.read()
    }

    /// Applies `f` to the record at `index`.
    pub fn update<R>(&self, index: usize, f: impl FnOnce(&mut M) -> R) -> Option<R> {
        self.inner.write().get_mut(index).map(f)
    }

    /// Applies `f` to every record, in order.
    pub fn for_each_mut(&self, f: impl FnMut(&mut M)) {
        self.inner.write().iter_mut().for_each(f);
    }

    /// Returns true if both handles share one sequence.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Swaps in new contents under a single write lock.
    pub(crate) fn replace(&self, records: Vec<M>) {
        let mut inner = self.inner.write();
        inner.clear();
        inner.extend(records);
    }

    pub(crate) fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<M: Clone> Records<M> {
    /// Returns a copy of the record at `index`.
    pub fn get(&self, index: usize) -> Option<M> {
        self.inner.read().get(index).cloned()
    }

    /// Returns a copy of all records.
    pub fn to_vec(&self) -> Vec<M> {
        self.inner.read().clone()
    }
}

impl<M> Clone for Records<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for Records<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: fmt::Debug> fmt::Debug for Records<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.read().iter()).finish()
    }
}
