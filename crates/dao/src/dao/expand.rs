//! Association expander
//!
//! Expansion entries are association names or dotted paths (`children.toys`). Paths
//! sharing a prefix are grouped into one [`ExpansionTree`] so every association is
//! resolved once per entity, and deeper levels are hydrated into the resolved entities.

use std::ops::Deref;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::joins::JoinDaos;
use super::{display_value, Dao};
use crate::descriptor::{Association, AssociationType};
use crate::entity::Entity;
use crate::error::{DaoError, DaoResult};
use crate::settings::{FindOptions, QuerySettings};

/// The entity an expansion starts from
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandContext {
    /// An entity carrying its primary key
    Entity(Entity),
    /// A primary key, resolved with `find`
    Id(Value),
}

impl From<Entity> for ExpandContext {
    fn from(entity: Entity) -> Self {
        ExpandContext::Entity(entity)
    }
}

impl From<Value> for ExpandContext {
    fn from(id: Value) -> Self {
        ExpandContext::Id(id)
    }
}

/// Association names grouped by path prefix, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ExpansionTree {
    branches: Vec<(String, ExpansionTree)>,
}

impl ExpansionTree {
    pub(crate) fn parse<S: AsRef<str>>(paths: &[S]) -> DaoResult<Self> {
        let mut tree = Self::default();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            let mut node = &mut tree;
            for segment in path.split('.').map(str::trim) {
                if segment.is_empty() {
                    return Err(DaoError::invalid(format!("expansion path [{}] has an empty segment", path)));
                }
                node = node.child(segment);
            }
        }
        Ok(tree)
    }

    fn child(&mut self, name: &str) -> &mut ExpansionTree {
        let position = match self.branches.iter().position(|(n, _)| n == name) {
            Some(position) => position,
            None => {
                self.branches.push((name.to_string(), ExpansionTree::default()));
                self.branches.len() - 1
            }
        };
        &mut self.branches[position].1
    }

    pub(crate) fn branch(&self, name: &str) -> Option<&ExpansionTree> {
        self.branches.iter().find(|(n, _)| n == name).map(|(_, tree)| tree)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// Target DAO of an association: the owner itself or one produced by a factory
pub(crate) enum TargetRef<'a> {
    Owner(&'a Dao),
    Other(Arc<Dao>),
}

impl Deref for TargetRef<'_> {
    type Target = Dao;

    fn deref(&self) -> &Dao {
        match self {
            TargetRef::Owner(dao) => dao,
            TargetRef::Other(dao) => dao,
        }
    }
}

impl Dao {
    /// Resolve the target DAO of an association; factories run on every call
    pub(crate) fn target(&self, association: &Association) -> DaoResult<TargetRef<'_>> {
        match &association.target_dao {
            Some(factory) => Ok(TargetRef::Other(factory()?)),
            None if association.self_referencing => Ok(TargetRef::Owner(self)),
            None => Err(DaoError::missing_collaborator(format!(
                "No target association DAO instance available for association {}",
                association.name
            ))),
        }
    }

    /// Parse expansion paths, rejecting first segments this descriptor does not declare
    pub(crate) fn expansion_tree<S: AsRef<str>>(&self, paths: &[S]) -> DaoResult<ExpansionTree> {
        let tree = ExpansionTree::parse(paths)?;
        self.check_expansion(&tree)?;
        Ok(tree)
    }

    fn check_expansion(&self, tree: &ExpansionTree) -> DaoResult<()> {
        match tree.names().find(|name| self.orm.association(name).is_none()) {
            Some(unknown) => Err(DaoError::UnknownAssociation {
                table: self.table().to_string(),
                name: unknown.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Populate every association of the tree on `entity`, in descriptor order
    pub(crate) fn expand_entity<'a>(
        &'a self,
        entity: &'a mut Entity,
        tree: &'a ExpansionTree,
    ) -> BoxFuture<'a, DaoResult<()>> {
        async move {
            self.check_expansion(tree)?;
            for association in self.orm.associations() {
                let Some(subtree) = tree.branch(&association.name) else {
                    continue;
                };
                let expansion = self.resolve_association(association, entity, subtree).await?;
                entity.set(association.name.clone(), expansion);
            }
            Ok(())
        }
        .boxed()
    }

    /// Expand one association path from a context entity or id
    ///
    /// Returns the target entity (or null) for one-to-one/many-to-one and an array for
    /// one-to-many/many-to-many, with deeper path levels hydrated.
    pub fn expand<'a>(&'a self, path: &'a str, context: ExpandContext) -> BoxFuture<'a, DaoResult<Value>> {
        async move {
            tracing::info!(
                dao = %self.log_context,
                "Expanding for association path {} and context entity {:?}",
                path,
                context
            );
            let tree = ExpansionTree::parse(&[path])?;
            let Some((name, subtree)) = tree.branches.first() else {
                return Err(DaoError::invalid(format!("expansionPath[{}]", path)));
            };
            let association = self.orm.association(name).ok_or_else(|| DaoError::UnknownAssociation {
                table: self.table().to_string(),
                name: name.clone(),
            })?;

            let primary_key = &self.orm.primary_key().name;
            let entity = match context {
                ExpandContext::Entity(entity) if entity.is_set(primary_key) => entity,
                ExpandContext::Entity(_) => {
                    return Err(DaoError::invalid(format!(
                        "context entity has no {} primary key value",
                        primary_key
                    )))
                }
                ExpandContext::Id(id) => self
                    .find(id.clone(), FindOptions::new())
                    .await?
                    .ok_or_else(|| DaoError::invalid(format!("No record found for context entity [{}]", id)))?,
            };

            self.resolve_association(association, &entity, subtree).await
        }
        .boxed()
    }

    /// The entity an owner-side join value points at: by primary key, or the first
    /// match on the association's `key`
    pub(crate) async fn find_referenced(&self, association: &Association, join_id: Value) -> DaoResult<Option<Entity>> {
        let primary_key = &self.orm.primary_key().name;
        match association.key.as_deref().filter(|key| *key != primary_key.as_str()) {
            None => self.find(join_id, FindOptions::new()).await,
            Some(key) => {
                self.require_property(key, &association.name)?;
                Ok(self
                    .list(QuerySettings::new().condition(key, join_id))
                    .await?
                    .into_iter()
                    .next())
            }
        }
    }

    async fn resolve_association(
        &self,
        association: &Association,
        context: &Entity,
        subtree: &ExpansionTree,
    ) -> DaoResult<Value> {
        let target = self.target(association)?;
        let primary_key = &self.orm.primary_key().name;

        match association.association_type {
            AssociationType::OneToOne | AssociationType::ManyToOne => {
                let Some(join_id) = context.get(&association.join_key).cloned() else {
                    return Ok(Value::Null);
                };
                tracing::info!(
                    dao = %self.log_context,
                    "Expanding association type {} on {}[{}]",
                    association.association_type,
                    association.join_key,
                    display_value(&join_id)
                );

                match target.find_referenced(association, join_id).await? {
                    Some(mut entity) => {
                        if !subtree.is_empty() {
                            target.expand_entity(&mut entity, subtree).await?;
                        }
                        Ok(entity.into_value())
                    }
                    None => Ok(Value::Null),
                }
            }
            AssociationType::OneToMany => {
                target.require_property(&association.join_key, &association.name)?;
                let key = association.key.as_deref().unwrap_or(primary_key);
                let Some(join_id) = context.get(key).cloned() else {
                    return Ok(Value::Array(Vec::new()));
                };
                tracing::info!(
                    dao = %self.log_context,
                    "Expanding association type {} on {}[{}]",
                    association.association_type,
                    association.join_key,
                    display_value(&join_id)
                );

                let settings = QuerySettings::new()
                    .condition(association.join_key.clone(), join_id)
                    .with_defaults(&association.defaults)?;
                let entities = target.list(settings).await?;
                target.hydrate(entities, subtree).await
            }
            AssociationType::ManyToMany => {
                let factory = association.join_dao.as_ref().ok_or_else(|| {
                    DaoError::missing_collaborator(format!(
                        "No join DAO instance available for association {}",
                        association.name
                    ))
                })?;
                let join = factory()?;
                let lister = join.join_lister().cloned().ok_or_else(|| {
                    DaoError::missing_collaborator(format!(
                        "No listJoins capability in join DAO instance available for association {}",
                        association.name
                    ))
                })?;
                join.require_property(&association.join_key, &association.name)?;

                let key = association.key.as_deref().unwrap_or(primary_key);
                let Some(join_id) = context.get(key).cloned() else {
                    return Ok(Value::Array(Vec::new()));
                };
                tracing::info!(
                    dao = %self.log_context,
                    "Expanding association type {} on {}[{}]",
                    association.association_type,
                    association.join_key,
                    display_value(&join_id)
                );

                let settings = QuerySettings::new().condition(association.join_key.clone(), join_id);
                let daos = JoinDaos {
                    source: self,
                    join: &join,
                    target: &target,
                };
                let entities = lister.list_joins(settings, daos).await?;
                target.hydrate(entities, subtree).await
            }
        }
    }

    /// Expand the remaining path levels on each entity and collect them as an array
    async fn hydrate(&self, entities: Vec<Entity>, subtree: &ExpansionTree) -> DaoResult<Value> {
        let mut values = Vec::with_capacity(entities.len());
        for mut entity in entities {
            if !subtree.is_empty() {
                self.expand_entity(&mut entity, subtree).await?;
            }
            values.push(entity.into_value());
        }
        Ok(Value::Array(values))
    }
}
