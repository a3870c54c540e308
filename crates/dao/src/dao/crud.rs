//! Insert, update, remove, count and table lifecycle

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use super::expand::TargetRef;
use super::{display_value, Dao};
use crate::descriptor::{Association, AssociationType, Operation};
use crate::entity::Entity;
use crate::error::{DaoError, DaoResult};
use crate::settings::{FindOptions, QuerySettings};
use crate::value::coerce_id;

impl Dao {
    /// Insert one entity, cascading its inline one-to-one/one-to-many sets, and
    /// return the generated primary key
    ///
    /// A one-to-one entity is inserted before its owner, whose `joinKey` is then set
    /// from it; one-to-many entities are inserted after the owner with their `joinKey`
    /// set from the owner.
    pub fn insert(&self, entity: Entity) -> BoxFuture<'_, DaoResult<Value>> {
        async move {
            tracing::info!(dao = %self.log_context, "Inserting {} entity", self.table());
            self.insert_one(entity).await
        }
        .boxed()
    }

    /// Insert entities one after another
    ///
    /// Not atomic: a failure compensates only the failing entity and aborts the rest,
    /// entities inserted before it stay inserted.
    pub async fn insert_all(&self, entities: Vec<Entity>) -> DaoResult<Vec<Value>> {
        tracing::info!(dao = %self.log_context, "Inserting {} {} entities", self.table(), entities.len());
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            ids.push(self.insert_one(entity).await?);
        }
        Ok(ids)
    }

    fn insert_one(&self, mut entity: Entity) -> BoxFuture<'_, DaoResult<Value>> {
        async move {
            let primary_key = self.orm.primary_key();
            let mut skip = vec![primary_key.name.as_str()];
            skip.extend(
                self.owned_associations()
                    .filter(|association| entity.is_set(&association.name))
                    .map(|association| association.join_key.as_str()),
            );
            self.validate_entity(&entity, &skip)?;
            self.check_unique(&entity).await?;

            let owned = self.insert_owned_entities(&mut entity).await?;
            let prepared = async {
                self.validate_entity(&entity, &[primary_key.name.as_str()])?;
                let mut image = self.to_row_image(&entity);
                let next = self.datasource.sequences().nextval(&self.sequence_name).await?;
                let id = coerce_id(primary_key.property_type, &Value::from(next))?;
                image.set(primary_key.name.clone(), id.clone());
                Ok::<_, DaoError>((image, id))
            }
            .await;
            let (image, id) = match prepared {
                Ok(prepared) => prepared,
                Err(err) => {
                    self.discard_owned(&owned).await;
                    return Err(err);
                }
            };

            match self.persist(&entity, &image).await {
                Ok(()) => {
                    tracing::info!(dao = %self.log_context, "{}[{}] entity inserted", self.table(), display_value(&id));
                    Ok(id)
                }
                Err(err) => {
                    tracing::error!(dao = %self.log_context, "Inserting {} entity failed: {}", self.table(), err);
                    self.compensate(&id).await;
                    self.discard_owned(&owned).await;
                    Err(err)
                }
            }
        }
        .boxed()
    }

    fn owned_associations(&self) -> impl Iterator<Item = &Association> {
        self.orm
            .associations()
            .iter()
            .filter(|association| association.association_type == AssociationType::OneToOne)
    }

    /// Insert inline one-to-one entities and point the owner's join keys at them
    ///
    /// Returns what was inserted so a later failure can remove it again.
    async fn insert_owned_entities(&self, entity: &mut Entity) -> DaoResult<Vec<(TargetRef<'_>, Value)>> {
        let mut inserted = Vec::new();
        for association in self.owned_associations() {
            if let Err(err) = self.insert_owned(association, entity, &mut inserted).await {
                self.discard_owned(&inserted).await;
                return Err(err);
            }
        }
        Ok(inserted)
    }

    async fn insert_owned<'a>(
        &'a self,
        association: &Association,
        entity: &mut Entity,
        inserted: &mut Vec<(TargetRef<'a>, Value)>,
    ) -> DaoResult<()> {
        let Some(owned) = entity.nested_one(&association.name)? else {
            return Ok(());
        };
        let target = self.target(association)?;
        let target_key = target.orm.primary_key().name.clone();
        let key = association.key.clone().unwrap_or_else(|| target_key.clone());
        target.require_property(&key, &association.name)?;

        let set = std::slice::from_ref(&owned);
        self.hooks.on_before_insert_association_set(&association.name, set, entity)?;
        self.hooks
            .on_before_insert_association_set_entity(&association.name, &owned, entity)?;
        tracing::info!(
            dao = %self.log_context,
            "Inserting inline entity into association {}",
            association.name
        );

        let owned_id = target.insert(owned.clone()).await?;
        let join_value = if key == target_key {
            owned_id.clone()
        } else {
            owned.get(&key).cloned().unwrap_or(Value::Null)
        };
        inserted.push((target, owned_id));
        entity.set(association.join_key.clone(), join_value);

        self.hooks.on_after_insert_association_set(&association.name, set, entity)
    }

    /// Best-effort removal of inline one-to-one entities of a failed insert
    async fn discard_owned(&self, inserted: &[(TargetRef<'_>, Value)]) {
        for (target, id) in inserted.iter().rev() {
            if let Err(err) = target.remove(id.clone()).await {
                tracing::error!(
                    dao = %self.log_context,
                    "Could not roll back inline {}[{}] entity: {}",
                    target.table(),
                    display_value(id),
                    err
                );
            }
        }
    }

    async fn check_unique(&self, entity: &Entity) -> DaoResult<()> {
        for property in self.orm.unique_properties().filter(|p| !p.id) {
            let Some(value) = entity.get(&property.name) else {
                continue;
            };
            let statement = self.statements.unique_check(property)?;
            let mut bindings = Map::new();
            bindings.insert(property.name.clone(), value.clone());

            if !self.execute(&statement, &bindings).await?.into_rows().is_empty() {
                return Err(DaoError::UniqueConstraintViolation {
                    property: property.name.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }

    /// Write the row image and cascade inline association sets
    async fn persist(&self, entity: &Entity, image: &Entity) -> DaoResult<()> {
        let statement = self.statements.insert()?;
        let inserted = self.execute(&statement, image).await?.affected();
        if inserted == 0 {
            return Err(DaoError::ExecutionFailed(format!("Insert into {} affected no rows", self.table())));
        }

        self.hooks.on_after_insert(image)?;
        self.insert_association_sets(entity, image).await
    }

    async fn insert_association_sets(&self, entity: &Entity, image: &Entity) -> DaoResult<()> {
        let primary_key = &self.orm.primary_key().name;
        for association in self.orm.associations() {
            if association.association_type != AssociationType::OneToMany || !entity.is_set(&association.name) {
                continue;
            }
            let children = entity.nested(&association.name)?;
            if children.is_empty() {
                continue;
            }

            let target = self.target(association)?;
            let key = association.key.as_deref().unwrap_or(primary_key);
            let join_value = image.get(key).cloned().unwrap_or(Value::Null);

            self.hooks.on_before_insert_association_set(&association.name, &children, image)?;
            tracing::info!(
                dao = %self.log_context,
                "Inserting {} inline entities into association set {}",
                children.len(),
                association.name
            );
            for mut child in children.iter().cloned() {
                child.set(association.join_key.clone(), join_value.clone());
                self.hooks
                    .on_before_insert_association_set_entity(&association.name, &child, image)?;
                target.insert(child).await?;
            }
            self.hooks.on_after_insert_association_set(&association.name, &children, image)?;
        }
        Ok(())
    }

    /// Best-effort removal of a partially inserted row; errors are only logged
    async fn compensate(&self, id: &Value) {
        tracing::info!(
            dao = %self.log_context,
            "Rolling back changes after failed {}[{}] insert",
            self.table(),
            display_value(id)
        );
        if let Err(err) = self.remove(id.clone()).await {
            tracing::error!(
                dao = %self.log_context,
                "Could not roll back changes after failed {}[{}] insert: {}",
                self.table(),
                display_value(id),
                err
            );
        }
    }

    /// Update the row of `entity` by primary key
    pub async fn update(&self, entity: &Entity) -> DaoResult<&Self> {
        let primary_key = &self.orm.primary_key().name;
        tracing::info!(
            dao = %self.log_context,
            "Updating {}[{}] entity",
            self.table(),
            entity.get(primary_key).map(display_value).unwrap_or_default()
        );

        let skip: Vec<&str> = self
            .orm
            .mandatory_properties()
            .filter(|p| !p.allows(Operation::Update))
            .map(|p| p.name.as_str())
            .collect();
        self.validate_entity(entity, &skip)?;

        let statement = self.statements.update()?;
        let mut image = self.to_row_image(entity);

        let result = async {
            self.hooks.on_before_update_entity(&mut image)?;
            self.execute(&statement, &image).await
        }
        .await;

        match result {
            Ok(executed) if executed.affected() > 0 => {
                tracing::info!(
                    dao = %self.log_context,
                    "{}[{}] entity updated",
                    self.table(),
                    image.get(primary_key).map(display_value).unwrap_or_default()
                );
                Ok(self)
            }
            Ok(_) => {
                tracing::info!(dao = %self.log_context, "No changes incurred in {}", self.table());
                Ok(self)
            }
            Err(err) => {
                tracing::error!(dao = %self.log_context, "Updating {} entity failed: {}", self.table(), err);
                Err(err)
            }
        }
    }

    /// Remove one entity and, first, its one-to-one/one-to-many dependents
    pub fn remove(&self, id: impl Into<Value>) -> BoxFuture<'_, DaoResult<()>> {
        self.remove_one(id.into())
    }

    /// Remove entities in order; the first failure aborts the rest
    pub async fn remove_many<I>(&self, ids: I) -> DaoResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        tracing::info!(dao = %self.log_context, "Deleting {} {} entities", ids.len(), self.table());
        for id in ids {
            self.remove_one(id).await?;
        }
        Ok(())
    }

    /// Remove every entity, resolving the primary keys with a key-only listing
    pub async fn remove_all(&self) -> DaoResult<()> {
        let primary_key = self.orm.primary_key().name.clone();
        let ids: Vec<Value> = self
            .list(QuerySettings::new().select([primary_key.as_str()]))
            .await?
            .into_iter()
            .filter_map(|entity| entity.get(&primary_key).cloned())
            .collect();
        self.remove_many(ids).await
    }

    fn remove_one(&self, id: Value) -> BoxFuture<'_, DaoResult<()>> {
        async move {
            let id = coerce_id(self.orm.primary_key().property_type, &id)?;
            tracing::info!(dao = %self.log_context, "Deleting {}[{}] entity", self.table(), display_value(&id));

            match self.remove_cascading(&id).await {
                Ok(0) => {
                    tracing::info!(dao = %self.log_context, "No changes incurred in {}", self.table());
                    Ok(())
                }
                Ok(_) => {
                    tracing::info!(dao = %self.log_context, "{}[{}] entity deleted", self.table(), display_value(&id));
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(
                        dao = %self.log_context,
                        "Deleting {}[{}] entity failed: {}",
                        self.table(),
                        display_value(&id),
                        err
                    );
                    Err(err)
                }
            }
        }
        .boxed()
    }

    /// Dependents first, then the row itself; returns the deleted row count
    async fn remove_cascading(&self, id: &Value) -> DaoResult<u64> {
        self.hooks.on_before_remove_entity(id)?;

        let primary_key = &self.orm.primary_key().name;
        let reads_row = self.orm.associations().iter().any(|association| {
            association.association_type.cascades()
                && (association.association_type.joins_on_owner()
                    || association.key.as_deref().is_some_and(|key| key != primary_key.as_str()))
        });
        let row = if reads_row {
            self.find(id.clone(), FindOptions::new()).await?
        } else {
            None
        };

        for association in self.orm.associations() {
            if !association.association_type.cascades() {
                continue;
            }
            tracing::debug!(
                dao = %self.log_context,
                "Inspecting {}[{}] entity's dependency '{}' for entities to delete",
                self.table(),
                display_value(id),
                association.name
            );

            let target = self.target(association)?;
            let dependents: Vec<Entity> = if association.association_type.joins_on_owner() {
                match row.as_ref().and_then(|row| row.get(&association.join_key)) {
                    Some(join_id) => target
                        .find_referenced(association, join_id.clone())
                        .await?
                        .into_iter()
                        .collect(),
                    None => Vec::new(),
                }
            } else {
                target.require_property(&association.join_key, &association.name)?;
                let join_id = match association.key.as_deref().filter(|key| *key != primary_key.as_str()) {
                    Some(key) => row.as_ref().and_then(|row| row.get(key)).cloned(),
                    None => Some(id.clone()),
                };
                match join_id {
                    Some(join_id) => {
                        target
                            .list(QuerySettings::new().condition(association.join_key.clone(), join_id))
                            .await?
                    }
                    None => Vec::new(),
                }
            };
            if dependents.is_empty() {
                continue;
            }

            tracing::info!(
                dao = %self.log_context,
                "Deleting {}[{}] entity's {} dependent {}",
                self.table(),
                display_value(id),
                dependents.len(),
                association.name
            );
            self.hooks
                .on_before_remove_association_set(&association.name, &dependents, id)?;

            let target_key = &target.orm.primary_key().name;
            for dependent in &dependents {
                self.hooks
                    .on_before_remove_association_set_entity(&association.name, dependent, id)?;
                if let Some(dependent_id) = dependent.get(target_key) {
                    target.remove(dependent_id.clone()).await?;
                }
            }
        }

        let statement = self.statements.delete()?;
        let mut bindings = Map::new();
        bindings.insert(primary_key.clone(), id.clone());
        Ok(self.execute(&statement, &bindings).await?.affected())
    }

    pub async fn count(&self) -> DaoResult<u64> {
        tracing::info!(dao = %self.log_context, "Counting {} entities", self.table());

        let result = async {
            let statement = self.statements.count()?;
            let rows = self.execute(&statement, &Map::new()).await?.into_rows();
            let count = rows
                .first()
                .and_then(|row| row.values().next())
                .map(|value| match value {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                })
                .unwrap_or(Some(0));
            count.ok_or_else(|| DaoError::ExecutionFailed(format!("Count of {} is not a number", self.table())))
        }
        .await;

        match result {
            Ok(count) => {
                tracing::info!(dao = %self.log_context, "{} {} entities counted", count, self.table());
                Ok(count)
            }
            Err(err) => {
                tracing::error!(dao = %self.log_context, "Counting {} entities failed: {}", self.table(), err);
                Err(err)
            }
        }
    }

    /// Whether a count probe against the table succeeds
    ///
    /// Every failure, including an unreachable backend, reads as `false`.
    pub async fn exists_table(&self) -> bool {
        tracing::info!(dao = %self.log_context, "Check exists table {}", self.table());
        let probe = async {
            let statement = self.statements.count()?;
            self.execute(&statement, &Map::new()).await
        }
        .await;

        match probe {
            Ok(executed) => !executed.into_rows().is_empty(),
            Err(err) => {
                tracing::warn!(dao = %self.log_context, "Table {} probe failed: {}", self.table(), err);
                false
            }
        }
    }

    pub async fn create_table(&self) -> DaoResult<&Self> {
        tracing::info!(dao = %self.log_context, "Creating table {}", self.table());
        let statement = self.statements.create_table()?;
        match self.execute(&statement, &Map::new()).await {
            Ok(_) => {
                tracing::info!(dao = %self.log_context, "{} table created", self.table());
                Ok(self)
            }
            Err(err) => {
                tracing::error!(dao = %self.log_context, "Create table {} failed: {}", self.table(), err);
                Err(err)
            }
        }
    }

    /// Drop the table and, when asked, its primary-key sequence
    pub async fn drop_table(&self, drop_sequence: bool) -> DaoResult<&Self> {
        tracing::info!(dao = %self.log_context, "Dropping table {}", self.table());
        let statement = self.statements.drop_table()?;
        if let Err(err) = self.execute(&statement, &Map::new()).await {
            tracing::error!(dao = %self.log_context, "Dropping table {} failed: {}", self.table(), err);
            return Err(err);
        }
        tracing::info!(dao = %self.log_context, "Table {} dropped", self.table());

        if drop_sequence {
            if let Err(err) = self.datasource.sequences().drop_sequence(&self.sequence_name).await {
                tracing::error!(
                    dao = %self.log_context,
                    "Dropping table {} sequence {} failed: {}",
                    self.table(),
                    self.sequence_name,
                    err
                );
                return Err(err);
            }
            tracing::info!(dao = %self.log_context, "Table {} sequence {} dropped", self.table(), self.sequence_name);
        }
        Ok(self)
    }
}
