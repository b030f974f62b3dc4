//! Registry of initialized collections.

use crate::error::{SyncError, SyncResult};
use crate::model::Model;
use crate::records::Records;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// A registered collection with its model type erased.
///
/// The sync engine drives every collection through this trait, so resyncs
/// can rebuild records without knowing their concrete type.
pub(crate) trait CollectionSlot: Send + Sync {
    /// Collection name.
    fn name(&self) -> &str;

    /// Type name of the model.
    fn model_type(&self) -> &'static str;

    /// Replaces the records with `raw` rebuilt through the model.
    /// Returns how many records were kept.
    fn rehydrate(&self, raw: Vec<Value>) -> usize;

    /// Removes every record.
    fn clear(&self);

    fn as_any(&self) -> &dyn Any;
}

/// A collection slot for one model type.
pub(crate) struct TypedSlot<M: Model> {
    name: String,
    records: Records<M>,
}

impl<M: Model> TypedSlot<M> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Records::new(),
        }
    }
}

impl<M: Model> CollectionSlot for TypedSlot<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_type(&self) -> &'static str {
        type_name::<M>()
    }

    fn rehydrate(&self, raw: Vec<Value>) -> usize {
        let total = raw.len();
        let mut records = Vec::with_capacity(total);
        for (index, literal) in raw.into_iter().enumerate() {
            match M::from_raw(literal) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(collection = %self.name, index, error = %e, "skipping record that does not fit the model");
                }
            }
        }
        let kept = records.len();
        self.records.replace(records);
        kept
    }

    fn clear(&self) {
        self.records.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Tracks which collections have been loaded, their model type and their
/// live records.
///
/// An entry is created the first time a collection is read from local
/// storage and then reused: later loads rebuild its records in place.
/// Entries are only removed by [`clear`](CollectionRegistry::clear).
#[derive(Default)]
pub struct CollectionRegistry {
    slots: RwLock<BTreeMap<String, Arc<dyn CollectionSlot>>>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the collection is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Returns the registered collection names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Returns the number of registered collections.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Returns the model type name a collection is registered with.
    pub fn model_type(&self, name: &str) -> Option<&'static str> {
        self.slots.read().get(name).map(|slot| slot.model_type())
    }

    /// Returns the live records of a collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the collection is not registered
    /// and [`SyncError::ModelMismatch`] if it holds another model type.
    pub fn records<M: Model>(&self, name: &str) -> SyncResult<Records<M>> {
        let slots = self.slots.read();
        let slot = slots.get(name).ok_or_else(|| SyncError::NotFound {
            name: name.to_string(),
        })?;

        slot.as_any()
            .downcast_ref::<TypedSlot<M>>()
            .map(|typed| typed.records.clone())
            .ok_or_else(|| SyncError::ModelMismatch {
                name: name.to_string(),
                registered: slot.model_type(),
                requested: type_name::<M>(),
            })
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Returns the registered slot for `slot.name()`, inserting `slot` if
    /// there is none yet.
    pub(crate) fn get_or_insert(&self, slot: Arc<dyn CollectionSlot>) -> Arc<dyn CollectionSlot> {
        let mut slots = self.slots.write();
        Arc::clone(
            slots
                .entry(slot.name().to_string())
                .or_insert(slot),
        )
    }

    /// Returns a snapshot of every slot.
    pub(crate) fn entries(&self) -> Vec<Arc<dyn CollectionSlot>> {
        self.slots.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("collections", &self.names())
            .finish()
    }
}
