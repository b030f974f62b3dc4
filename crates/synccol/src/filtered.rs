//! Selection filtering on top of a collection.

use crate::collection::{values_equal, BaseCollection, Extension};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synccol_engine::{BaseModel, Checkable, Records, SyncEngine, SyncResult};

/// Default name of a [`FilteredCollection`].
pub const DEFAULT_FILTERED_NAME: &str = "baseFiltered";

/// A collection whose records can be checked to filter other data.
///
/// While nothing is checked the filter shows everything. Checking a record
/// narrows the selection to values of checked records; unchecking the last
/// one shows everything again.
///
/// Clones share the filter state.
#[derive(Clone)]
pub struct FilteredCollection<M: Checkable = BaseModel> {
    collection: BaseCollection<M>,
    show_all: Arc<AtomicBool>,
}

impl FilteredCollection<BaseModel> {
    /// Creates the base filtered definition, named `"baseFiltered"`.
    pub fn new(engine: SyncEngine) -> Self {
        Self::from_collection(
            BaseCollection::new(engine).extend(Extension::named(DEFAULT_FILTERED_NAME)),
        )
    }
}

impl<M: Checkable> FilteredCollection<M> {
    /// Adds filtering to an existing definition.
    pub fn from_collection(collection: BaseCollection<M>) -> Self {
        Self {
            collection,
            show_all: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the underlying definition.
    pub fn collection(&self) -> &BaseCollection<M> {
        &self.collection
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    /// Returns a new definition with the overrides applied and its own
    /// filter state, starting from the current one.
    pub fn extend(&self, extension: Extension) -> Self {
        self.derive(self.collection.extend(extension))
    }

    /// Returns the same definition with another model type.
    pub fn with_model<N: Checkable>(&self) -> FilteredCollection<N> {
        FilteredCollection {
            collection: self.collection.with_model::<N>(),
            show_all: Arc::new(AtomicBool::new(self.show_all())),
        }
    }

    /// Extends the definition and starts syncing it.
    pub fn extend_and_persist(&self, extension: Extension) -> Self {
        self.derive(self.collection.extend_and_persist(extension))
    }

    fn derive(&self, collection: BaseCollection<M>) -> Self {
        Self {
            collection,
            show_all: Arc::new(AtomicBool::new(self.show_all())),
        }
    }

    /// Returns the live records of the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection was never initialized.
    pub fn all(&self) -> SyncResult<Records<M>> {
        self.collection.all()
    }

    /// Waits for the pending initialization and returns the records.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection could not be initialized.
    pub async fn loaded(&self) -> SyncResult<Records<M>> {
        self.collection.loaded().await
    }

    /// Returns true if nothing is checked.
    pub fn show_all(&self) -> bool {
        self.show_all.load(Ordering::SeqCst)
    }

    /// Returns true if `selection` passes the filter.
    ///
    /// `selection` is a single value or an array of values, compared with
    /// `field` (default `"name"`) of every checked record.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection was never initialized.
    pub fn is_selected(&self, selection: &Value, field: Option<&str>) -> SyncResult<bool> {
        if self.show_all() {
            return Ok(true);
        }

        let field = field.unwrap_or("name");
        let records = self.all()?;
        let checked: Vec<Value> = records
            .read()
            .iter()
            .filter(|record| record.is_checked())
            .filter_map(|record| record.field(field))
            .collect();

        let is_checked = |value: &Value| checked.iter().any(|c| values_equal(c, value));
        Ok(match selection {
            Value::Array(items) => items.iter().any(is_checked),
            single => is_checked(single),
        })
    }

    /// Flips the checked flag of the record at `index`.
    ///
    /// Returns the new flag, or `None` if there is no such record.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection was never initialized.
    pub fn toggle_filter(&self, index: usize) -> SyncResult<Option<bool>> {
        let records = self.all()?;
        let toggled = records.update(index, |record| {
            let checked = !record.is_checked();
            record.set_checked(checked);
            checked
        });

        match toggled {
            Some(true) => self.show_all.store(false, Ordering::SeqCst),
            Some(false) => {
                let any_checked = records.read().iter().any(|record| record.is_checked());
                if !any_checked {
                    self.show_all.store(true, Ordering::SeqCst);
                }
            }
            None => {}
        }
        Ok(toggled)
    }

    /// Unchecks every record and shows everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection was never initialized.
    pub fn reset_filter(&self) -> SyncResult<()> {
        let records = self.all()?;
        records.for_each_mut(|record| record.set_checked(false));
        self.show_all.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl<M: Checkable> std::fmt::Debug for FilteredCollection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredCollection")
            .field("collection", &self.collection)
            .field("show_all", &self.show_all())
            .finish()
    }
}
