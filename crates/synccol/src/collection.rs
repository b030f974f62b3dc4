//! Collection definitions and queries.

use serde_json::{Map, Value};
use synccol_engine::{BaseModel, InitHandle, Model, Records, SyncEngine, SyncResult};
use tracing::debug;

/// Default name of a [`BaseCollection`].
pub const DEFAULT_NAME: &str = "bases";

/// Overrides applied by [`BaseCollection::extend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extension {
    name: Option<String>,
}

impl Extension {
    /// Creates an extension that overrides nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extension that renames the collection.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with_name(name)
    }

    /// Sets the collection name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the overridden name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A named collection definition bound to a sync engine.
///
/// Definitions are values: [`extend`](Self::extend) returns a new
/// definition and leaves the original untouched.
/// [`extend_and_persist`](Self::extend_and_persist) additionally starts
/// syncing the collection.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use std::sync::Arc;
/// use synccol::{BaseCollection, Extension, LocalStorage, MockRemote, SyncConfig, SyncEngine};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let remote = Arc::new(MockRemote::new());
/// remote.set_counter("users", 1);
/// remote.set_collection("users", json!([{"id": 1, "name": "ada"}]));
///
/// let engine = SyncEngine::new(
///     SyncConfig::new("https://api.example.com"),
///     Arc::new(LocalStorage::in_memory("demo")),
///     remote,
/// );
/// let users = BaseCollection::new(engine).extend_and_persist(Extension::named("users"));
/// users.loaded().await.unwrap();
///
/// let ada = users.find_one(&json!("ada"), Some("name")).unwrap();
/// assert!(ada.is_some());
/// # }
/// ```
#[derive(Clone)]
pub struct BaseCollection<M: Model = BaseModel> {
    name: String,
    engine: SyncEngine,
    pending: Option<InitHandle<M>>,
}

impl BaseCollection<BaseModel> {
    /// Creates the base definition, named `"bases"`.
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            engine,
            pending: None,
        }
    }
}

impl<M: Model> BaseCollection<M> {
    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the engine the collection syncs through.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Returns the pending initialization started by
    /// [`extend_and_persist`](Self::extend_and_persist).
    pub fn pending(&self) -> Option<&InitHandle<M>> {
        self.pending.as_ref()
    }

    /// Returns a new definition with the overrides applied.
    pub fn extend(&self, extension: Extension) -> Self {
        let mut extended = self.clone();
        if let Some(name) = extension.name {
            extended.name = name;
        }
        extended
    }

    /// Returns the same definition with another model type.
    pub fn with_model<N: Model>(&self) -> BaseCollection<N> {
        BaseCollection {
            name: self.name.clone(),
            engine: self.engine.clone(),
            pending: None,
        }
    }

    /// Extends the definition and starts syncing it.
    ///
    /// The initialization is registered with the engine's load
    /// coordinator and kept on the returned definition.
    pub fn extend_and_persist(&self, extension: Extension) -> Self {
        let mut extended = self.extend(extension);
        debug!(collection = %extended.name, "persisting collection");
        extended.pending = Some(extended.engine.init::<M>(&extended.name));
        extended
    }

    /// Waits for the pending initialization, if any, and returns the
    /// records.
    ///
    /// # Errors
    ///
    /// Returns the initialization error, or the error of [`all`](Self::all).
    pub async fn loaded(&self) -> SyncResult<Records<M>> {
        match &self.pending {
            Some(pending) => pending.clone().await,
            None => self.all(),
        }
    }

    /// Returns the live records of the collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`](synccol_engine::SyncError::NotFound)
    /// if the collection was never initialized.
    pub fn all(&self) -> SyncResult<Records<M>> {
        self.engine.get(&self.name)
    }

    /// Returns every record matching the query, in order.
    ///
    /// `query` is either an object whose pairs must all match, or a scalar
    /// compared with `field`. A scalar without a field matches nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection was never initialized.
    pub fn find(&self, query: &Value, field: Option<&str>) -> SyncResult<Vec<M>> {
        let Some(query) = Query::from_args(query, field) else {
            return Ok(Vec::new());
        };
        let records = self.all()?;
        let matches = records
            .read()
            .iter()
            .filter(|record| query.matches(*record))
            .cloned()
            .collect();
        Ok(matches)
    }

    /// Returns the first record matching the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection was never initialized.
    pub fn find_one(&self, query: &Value, field: Option<&str>) -> SyncResult<Option<M>> {
        let Some(query) = Query::from_args(query, field) else {
            return Ok(None);
        };
        let records = self.all()?;
        let found = records
            .read()
            .iter()
            .find(|record| query.matches(*record))
            .cloned();
        Ok(found)
    }
}

impl<M: Model> std::fmt::Debug for BaseCollection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseCollection")
            .field("name", &self.name)
            .field("model", &std::any::type_name::<M>())
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// Field constraints that must all hold for a record to match.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    constraints: Vec<(String, Value)>,
}

impl Query {
    /// Builds a query from `find` arguments.
    ///
    /// Returns `None` for a scalar query without a field.
    pub fn from_args(query: &Value, field: Option<&str>) -> Option<Self> {
        match (query, field) {
            (Value::Object(pairs), _) => Some(Self::from_pairs(pairs)),
            (scalar, Some(field)) => Some(Self {
                constraints: vec![(field.to_string(), scalar.clone())],
            }),
            (_, None) => None,
        }
    }

    fn from_pairs(pairs: &Map<String, Value>) -> Self {
        Self {
            constraints: pairs
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Returns the constraints as `(field, value)` pairs.
    pub fn constraints(&self) -> &[(String, Value)] {
        &self.constraints
    }

    /// Returns true if every constraint holds for `record`.
    ///
    /// A record without a constrained field does not match.
    pub fn matches<M: Model>(&self, record: &M) -> bool {
        self.constraints.iter().all(|(key, expected)| {
            record
                .field(key)
                .is_some_and(|actual| values_equal(&actual, expected))
        })
    }
}

/// Strict value equality, except that numbers compare by value.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> BaseModel {
        BaseModel::from_raw(value).unwrap()
    }

    #[test]
    fn extension_builder() {
        assert_eq!(Extension::new().name(), None);
        assert_eq!(Extension::named("users").name(), Some("users"));
    }

    #[test]
    fn object_query_uses_and_semantics() {
        let query = Query::from_args(&json!({"a": 1, "b": 2}), None).unwrap();
        assert_eq!(query.constraints().len(), 2);

        assert!(query.matches(&record(json!({"a": 1, "b": 2, "c": 3}))));
        assert!(!query.matches(&record(json!({"a": 1, "b": 3}))));
        assert!(!query.matches(&record(json!({"a": 1}))));
    }

    #[test]
    fn object_query_ignores_field() {
        let query = Query::from_args(&json!({"a": 1}), Some("b")).unwrap();
        assert_eq!(query.constraints(), &[("a".to_string(), json!(1))]);
    }

    #[test]
    fn scalar_query_needs_a_field() {
        assert!(Query::from_args(&json!("ada"), None).is_none());

        let query = Query::from_args(&json!("ada"), Some("name")).unwrap();
        assert!(query.matches(&record(json!({"name": "ada"}))));
        assert!(!query.matches(&record(json!({"name": "bob"}))));
    }

    #[test]
    fn comparison_is_strict() {
        let query = Query::from_args(&json!(1), Some("id")).unwrap();
        assert!(!query.matches(&record(json!({"id": "1"}))));
        assert!(query.matches(&record(json!({"id": 1.0}))));

        let empty = Query::from_args(&json!({}), None).unwrap();
        assert!(empty.matches(&record(json!({}))));
    }
}
