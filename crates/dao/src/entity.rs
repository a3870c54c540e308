//! Entity values exchanged with DAOs
//!
//! An entity is an untyped property-name → value mapping. Only properties declared in the
//! descriptor are persisted or read; other keys (inline association sets, expansions) ride
//! along untouched. `null` is never stored: setting a null value unsets the property.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DaoError, DaoResult};

/// Property-name → value mapping for one row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    /// Create an empty entity
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build an entity from a JSON value; only objects are accepted
    pub fn from_value(value: Value) -> DaoResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(DaoError::invalid(format!(
                "entity is expected to be an object but was {}",
                other
            ))),
        }
    }

    /// Value of a property, `None` when unset
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    /// Whether the property holds a value
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a property; a null value unsets it
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        match value.into() {
            Value::Null => {
                self.0.remove(&name);
            }
            value => {
                self.0.insert(name, value);
            }
        }
        self
    }

    /// Builder-style [`Entity::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove a property, returning its value
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name).filter(|value| !value.is_null())
    }

    /// Nested entities carried inline under `name` (an inline association set)
    pub fn nested(&self, name: &str) -> DaoResult<Vec<Entity>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items.iter().cloned().map(Entity::from_value).collect(),
            Some(other) => Err(DaoError::invalid(format!(
                "association set '{}' is expected to be an array but was {}",
                name, other
            ))),
        }
    }

    /// Inline single-entity association: an object, or an array holding at most one
    pub fn nested_one(&self, name: &str) -> DaoResult<Option<Entity>> {
        match self.get(name) {
            None => Ok(None),
            Some(object @ Value::Object(_)) => Entity::from_value(object.clone()).map(Some),
            Some(Value::Array(items)) if items.len() <= 1 => {
                items.first().cloned().map(Entity::from_value).transpose()
            }
            Some(other) => Err(DaoError::invalid(format!(
                "association '{}' is expected to be a single entity but was {}",
                name, other
            ))),
        }
    }

    /// Consume into the underlying JSON object
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Consume into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Deref for Entity {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().filter(|(_, value)| !value.is_null()).collect())
    }
}

impl TryFrom<Value> for Entity {
    type Error = DaoError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Entity::from_value(value)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        entity.into_value()
    }
}
