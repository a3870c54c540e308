//! Association metadata - declared relationships between descriptors

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::Dao;
use crate::error::DaoResult;

/// Kind of relationship between the owning descriptor and its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationType {
    #[serde(rename = "ONE-TO-ONE", alias = "ONE_TO_ONE")]
    OneToOne,
    #[serde(rename = "ONE-TO-MANY", alias = "ONE_TO_MANY")]
    OneToMany,
    #[serde(rename = "MANY-TO-ONE", alias = "MANY_TO_ONE")]
    ManyToOne,
    #[serde(rename = "MANY-TO-MANY", alias = "MANY_TO_MANY")]
    ManyToMany,
}

impl AssociationType {
    /// Whether inserts and removes cascade into the target
    pub fn cascades(self) -> bool {
        matches!(self, AssociationType::OneToOne | AssociationType::OneToMany)
    }

    /// Whether the expansion is a collection
    pub fn is_collection(self) -> bool {
        matches!(self, AssociationType::OneToMany | AssociationType::ManyToMany)
    }

    /// Whether `joinKey` names a property on the owning descriptor
    pub fn joins_on_owner(self) -> bool {
        matches!(self, AssociationType::OneToOne | AssociationType::ManyToOne)
    }
}

impl fmt::Display for AssociationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationType::OneToOne => write!(f, "ONE-TO-ONE"),
            AssociationType::OneToMany => write!(f, "ONE-TO-MANY"),
            AssociationType::ManyToOne => write!(f, "MANY-TO-ONE"),
            AssociationType::ManyToMany => write!(f, "MANY-TO-MANY"),
        }
    }
}

/// Lazily invoked DAO constructor, resolved once per use and never memoized
pub type DaoFactory = Arc<dyn Fn() -> DaoResult<Arc<Dao>> + Send + Sync>;

/// A declared association of an ORM descriptor
#[derive(Clone)]
pub struct Association {
    pub name: String,
    pub association_type: AssociationType,
    /// One-to-one/many-to-one: owner property holding the target key.
    /// One-to-many: target property referencing the owner.
    /// Many-to-many: join-table property referencing the owner.
    pub join_key: String,
    /// Non-primary key to join on (target side for one-to-one/many-to-one, owner side otherwise)
    pub key: Option<String>,
    /// Default list settings merged into one-to-many expansions
    pub defaults: Map<String, Value>,
    pub(crate) target_dao: Option<DaoFactory>,
    pub(crate) join_dao: Option<DaoFactory>,
    pub(crate) self_referencing: bool,
}

impl Association {
    pub fn new(
        name: impl Into<String>,
        association_type: AssociationType,
        join_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            association_type,
            join_key: join_key.into(),
            key: None,
            defaults: Map::new(),
            target_dao: None,
            join_dao: None,
            self_referencing: false,
        }
    }

    pub fn one_to_one(name: impl Into<String>, join_key: impl Into<String>) -> Self {
        Self::new(name, AssociationType::OneToOne, join_key)
    }

    pub fn one_to_many(name: impl Into<String>, join_key: impl Into<String>) -> Self {
        Self::new(name, AssociationType::OneToMany, join_key)
    }

    pub fn many_to_one(name: impl Into<String>, join_key: impl Into<String>) -> Self {
        Self::new(name, AssociationType::ManyToOne, join_key)
    }

    pub fn many_to_many(name: impl Into<String>, join_key: impl Into<String>) -> Self {
        Self::new(name, AssociationType::ManyToMany, join_key)
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Factory for the target DAO
    pub fn target<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> DaoResult<Arc<Dao>> + Send + Sync + 'static,
    {
        self.target_dao = Some(Arc::new(factory));
        self
    }

    /// The owning DAO is its own target (hierarchies)
    pub fn targets_owner(mut self) -> Self {
        self.self_referencing = true;
        self
    }

    /// Factory for the join DAO of a many-to-many association
    pub fn join<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> DaoResult<Arc<Dao>> + Send + Sync + 'static,
    {
        self.join_dao = Some(Arc::new(factory));
        self
    }

    pub fn defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Owner property read to obtain the join value, `None` meaning the primary key
    pub fn owner_key(&self) -> Option<&str> {
        if self.association_type.joins_on_owner() {
            Some(self.join_key.as_str())
        } else {
            self.key.as_deref()
        }
    }

    pub fn has_target(&self) -> bool {
        self.target_dao.is_some() || self.self_referencing
    }

    pub fn has_join(&self) -> bool {
        self.join_dao.is_some()
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.name)
            .field("type", &self.association_type)
            .field("join_key", &self.join_key)
            .field("key", &self.key)
            .field("defaults", &self.defaults)
            .field("target_dao", &self.target_dao.is_some())
            .field("join_dao", &self.join_dao.is_some())
            .field("self_referencing", &self.self_referencing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascading_kinds() {
        assert!(AssociationType::OneToOne.cascades());
        assert!(AssociationType::OneToMany.cascades());
        assert!(!AssociationType::ManyToOne.cascades());
        assert!(!AssociationType::ManyToMany.cascades());
    }

    #[test]
    fn test_owner_key_per_kind() {
        let parent = Association::many_to_one("parent", "parentId");
        assert_eq!(parent.owner_key(), Some("parentId"));

        let children = Association::one_to_many("children", "parentId");
        assert_eq!(children.owner_key(), None);

        let by_code = Association::one_to_many("children", "parentCode").key("code");
        assert_eq!(by_code.owner_key(), Some("code"));
    }

    #[test]
    fn test_association_type_names() {
        let parsed: AssociationType = serde_json::from_str("\"MANY-TO-MANY\"").unwrap();
        assert_eq!(parsed, AssociationType::ManyToMany);
        let aliased: AssociationType = serde_json::from_str("\"ONE_TO_MANY\"").unwrap();
        assert_eq!(aliased, AssociationType::OneToMany);
        assert_eq!(AssociationType::OneToOne.to_string(), "ONE-TO-ONE");
    }

    #[test]
    fn test_target_resolution_flags() {
        let owned = Association::one_to_many("children", "parentId").targets_owner();
        assert!(owned.has_target());
        assert!(!owned.has_join());
        assert!(!Association::one_to_many("children", "parentId").has_target());
    }
}
