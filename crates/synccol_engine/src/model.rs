//! Record models.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A typed record of a synced collection.
///
/// Raw records arrive as JSON values; [`from_raw`](Model::from_raw) turns
/// each one into a model instance. Queries read fields through
/// [`field`](Model::field).
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Builds a model from one raw record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not fit the model.
    fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }

    /// Returns the value of a field, if the record has it.
    ///
    /// The default implementation serializes the record; models with direct
    /// field access should override it.
    fn field(&self, name: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(name),
            _ => None,
        }
    }
}

/// A record that can be checked in a filter selection.
pub trait Checkable: Model {
    /// Returns whether the record is checked.
    fn is_checked(&self) -> bool;

    /// Sets the checked flag.
    fn set_checked(&mut self, checked: bool);
}

/// A schemaless record: the raw JSON object, with field order preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseModel {
    fields: Map<String, Value>,
}

impl BaseModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `id` field.
    pub fn id(&self) -> Option<&Value> {
        self.fields.get("id")
    }

    /// Returns a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Returns all fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for BaseModel {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl Model for BaseModel {
    fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        // Non-object literals carry no own properties.
        match raw {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Ok(Self::default()),
        }
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}

impl Checkable for BaseModel {
    fn is_checked(&self) -> bool {
        self.fields
            .get("checked")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn set_checked(&mut self, checked: bool) {
        self.fields.insert("checked".into(), Value::Bool(checked));
    }
}

/// Renders `key:value` pairs joined by `-`.
///
/// Only number, string and array properties are shown; `id` and names
/// starting with `_` or `$` are skipped. Arrays render as `[a,b]`.
impl fmt::Display for BaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.fields {
            if key == "id" || key.starts_with('_') || key.starts_with('$') {
                continue;
            }
            let rendered = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                Value::Array(items) => {
                    let items: Vec<String> = items.iter().map(render_item).collect();
                    format!("[{}]", items.join(","))
                }
                _ => continue,
            };
            if !first {
                f.write_str("-")?;
            }
            write!(f, "{key}:{rendered}")?;
            first = false;
        }
        Ok(())
    }
}

fn render_item(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
