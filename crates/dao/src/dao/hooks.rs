//! Lifecycle callbacks
//!
//! Each slot is optional and invoked at a fixed point of an operation. A hook that
//! returns an error aborts the operation with that error; a failing insert hook is
//! compensated like any other insert failure.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::entity::Entity;
use crate::error::DaoResult;

/// Called with a persisted (or about to be persisted) entity image
pub type EntityHook = Arc<dyn Fn(&Entity) -> DaoResult<()> + Send + Sync>;

/// Called with an entity the hook may still modify
pub type EntityMutHook = Arc<dyn Fn(&mut Entity) -> DaoResult<()> + Send + Sync>;

/// Called with a primary key value
pub type IdHook = Arc<dyn Fn(&Value) -> DaoResult<()> + Send + Sync>;

/// Called with an association name, its inline entities and the parent entity image
pub type AssociationSetHook = Arc<dyn Fn(&str, &[Entity], &Entity) -> DaoResult<()> + Send + Sync>;

/// Called with an association name, one inline entity and the parent entity
pub type AssociationEntityHook = Arc<dyn Fn(&str, &Entity, &Entity) -> DaoResult<()> + Send + Sync>;

/// Called with an association name, the dependents about to be removed and the parent id
pub type RemoveSetHook = Arc<dyn Fn(&str, &[Entity], &Value) -> DaoResult<()> + Send + Sync>;

/// Called with an association name, one dependent about to be removed and the parent id
pub type RemoveEntityHook = Arc<dyn Fn(&str, &Entity, &Value) -> DaoResult<()> + Send + Sync>;

/// Named callback slots of a DAO
#[derive(Clone, Default)]
pub struct DaoHooks {
    after_insert: Option<EntityHook>,
    before_insert_association_set: Option<AssociationSetHook>,
    before_insert_association_set_entity: Option<AssociationEntityHook>,
    after_insert_association_set: Option<AssociationSetHook>,
    before_update_entity: Option<EntityMutHook>,
    before_remove_entity: Option<IdHook>,
    before_remove_association_set: Option<RemoveSetHook>,
    before_remove_association_set_entity: Option<RemoveEntityHook>,
    after_found: Option<EntityMutHook>,
}

impl DaoHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// After the row insert succeeded, before inline association sets are inserted
    pub fn after_insert<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Entity) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.after_insert = Some(Arc::new(hook));
        self
    }

    pub fn before_insert_association_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &[Entity], &Entity) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.before_insert_association_set = Some(Arc::new(hook));
        self
    }

    /// Before each inline entity of a set is inserted
    pub fn before_insert_association_set_entity<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Entity, &Entity) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.before_insert_association_set_entity = Some(Arc::new(hook));
        self
    }

    pub fn after_insert_association_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &[Entity], &Entity) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.after_insert_association_set = Some(Arc::new(hook));
        self
    }

    /// Receives the row image about to be written
    pub fn before_update_entity<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Entity) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.before_update_entity = Some(Arc::new(hook));
        self
    }

    pub fn before_remove_entity<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.before_remove_entity = Some(Arc::new(hook));
        self
    }

    pub fn before_remove_association_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &[Entity], &Value) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.before_remove_association_set = Some(Arc::new(hook));
        self
    }

    /// Before each dependent is removed
    pub fn before_remove_association_set_entity<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Entity, &Value) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.before_remove_association_set_entity = Some(Arc::new(hook));
        self
    }

    /// Receives each entity read by find or list
    pub fn after_found<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Entity) -> DaoResult<()> + Send + Sync + 'static,
    {
        self.after_found = Some(Arc::new(hook));
        self
    }

    pub(crate) fn on_after_insert(&self, entity: &Entity) -> DaoResult<()> {
        self.after_insert.as_ref().map_or(Ok(()), |hook| hook(entity))
    }

    pub(crate) fn on_before_insert_association_set(&self, name: &str, set: &[Entity], parent: &Entity) -> DaoResult<()> {
        self.before_insert_association_set
            .as_ref()
            .map_or(Ok(()), |hook| hook(name, set, parent))
    }

    pub(crate) fn on_before_insert_association_set_entity(
        &self,
        name: &str,
        entity: &Entity,
        parent: &Entity,
    ) -> DaoResult<()> {
        self.before_insert_association_set_entity
            .as_ref()
            .map_or(Ok(()), |hook| hook(name, entity, parent))
    }

    pub(crate) fn on_after_insert_association_set(&self, name: &str, set: &[Entity], parent: &Entity) -> DaoResult<()> {
        self.after_insert_association_set
            .as_ref()
            .map_or(Ok(()), |hook| hook(name, set, parent))
    }

    pub(crate) fn on_before_update_entity(&self, entity: &mut Entity) -> DaoResult<()> {
        self.before_update_entity.as_ref().map_or(Ok(()), |hook| hook(entity))
    }

    pub(crate) fn on_before_remove_entity(&self, id: &Value) -> DaoResult<()> {
        self.before_remove_entity.as_ref().map_or(Ok(()), |hook| hook(id))
    }

    pub(crate) fn on_before_remove_association_set(&self, name: &str, dependents: &[Entity], id: &Value) -> DaoResult<()> {
        self.before_remove_association_set
            .as_ref()
            .map_or(Ok(()), |hook| hook(name, dependents, id))
    }

    pub(crate) fn on_before_remove_association_set_entity(
        &self,
        name: &str,
        dependent: &Entity,
        id: &Value,
    ) -> DaoResult<()> {
        self.before_remove_association_set_entity
            .as_ref()
            .map_or(Ok(()), |hook| hook(name, dependent, id))
    }

    pub(crate) fn on_after_found(&self, entity: &mut Entity) -> DaoResult<()> {
        self.after_found.as_ref().map_or(Ok(()), |hook| hook(entity))
    }
}

impl fmt::Debug for DaoHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaoHooks")
            .field("after_insert", &self.after_insert.is_some())
            .field("before_insert_association_set", &self.before_insert_association_set.is_some())
            .field(
                "before_insert_association_set_entity",
                &self.before_insert_association_set_entity.is_some(),
            )
            .field("after_insert_association_set", &self.after_insert_association_set.is_some())
            .field("before_update_entity", &self.before_update_entity.is_some())
            .field("before_remove_entity", &self.before_remove_entity.is_some())
            .field("before_remove_association_set", &self.before_remove_association_set.is_some())
            .field(
                "before_remove_association_set_entity",
                &self.before_remove_association_set_entity.is_some(),
            )
            .field("after_found", &self.after_found.is_some())
            .finish()
    }
}
