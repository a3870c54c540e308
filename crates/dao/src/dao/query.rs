//! Single-entity reads and collection listing

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use super::expand::ExpansionTree;
use super::{display_value, Dao};
use crate::entity::Entity;
use crate::error::DaoResult;
use crate::settings::{FindOptions, FindQuery, QuerySettings};
use crate::value::coerce_id;

impl Dao {
    /// Read one entity by primary key; `None` when no row matches
    pub fn find(&self, id: impl Into<Value>, options: FindOptions) -> BoxFuture<'_, DaoResult<Option<Entity>>> {
        let id = id.into();
        async move {
            tracing::info!(
                dao = %self.log_context,
                "Finding {}[{}] entity with list parameters expand[{:?}], select[{:?}]",
                self.table(),
                display_value(&id),
                options.expand,
                options.select
            );

            match self.find_entity(&id, options).await {
                Ok(Some(entity)) => {
                    tracing::info!(dao = %self.log_context, "{}[{}] entity found", self.table(), display_value(&id));
                    Ok(Some(entity))
                }
                Ok(None) => {
                    tracing::info!(dao = %self.log_context, "{}[{}] entity not found", self.table(), display_value(&id));
                    Ok(None)
                }
                Err(err) => {
                    tracing::error!(
                        dao = %self.log_context,
                        "Finding {}[{}] entity failed: {}",
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

    /// Find with the object form `{id, $expand, $select}`
    pub async fn find_query(&self, query: FindQuery) -> DaoResult<Option<Entity>> {
        self.find(query.id, query.options).await
    }

    async fn find_entity(&self, id: &Value, options: FindOptions) -> DaoResult<Option<Entity>> {
        let primary_key = self.orm.primary_key();
        let expansion = match options.expand.as_deref() {
            Some(paths) => Some(self.expansion_tree(paths)?),
            None => None,
        };
        let mut select = options.select;
        if let (Some(select), Some(expansion)) = (select.as_mut(), expansion.as_ref()) {
            for name in self.join_columns(expansion) {
                if !select.iter().any(|s| s == &name) {
                    select.push(name);
                }
            }
        }

        let id = coerce_id(primary_key.property_type, id)?;
        let statement = self.statements.find(select.as_deref())?;
        let mut bindings = Map::new();
        bindings.insert(primary_key.name.clone(), id);

        let rows = self.execute(&statement, &bindings).await?.into_rows();
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let mut entity = self.to_entity(row, select.as_deref());
        if let Some(expansion) = expansion.as_ref() {
            self.expand_entity(&mut entity, expansion).await?;
        }
        self.hooks.on_after_found(&mut entity)?;
        Ok(Some(entity))
    }

    /// List entities matching the settings, in result-set order
    pub fn list(&self, settings: QuerySettings) -> BoxFuture<'_, DaoResult<Vec<Entity>>> {
        async move {
            tracing::info!(
                dao = %self.log_context,
                "Listing {} entity collection with list operators: {:?}",
                self.table(),
                settings
            );

            match self.list_entities(settings).await {
                Ok(entities) => {
                    tracing::info!(dao = %self.log_context, "{} {} entities found", entities.len(), self.table());
                    Ok(entities)
                }
                Err(err) => {
                    tracing::error!(dao = %self.log_context, "Listing {} entities failed: {}", self.table(), err);
                    Err(err)
                }
            }
        }
        .boxed()
    }

    async fn list_entities(&self, mut settings: QuerySettings) -> DaoResult<Vec<Entity>> {
        let expansion = match settings.expand.as_deref() {
            Some(paths) => Some(self.expansion_tree(paths)?),
            None => None,
        };
        if let Some(expansion) = expansion.as_ref() {
            for name in self.join_columns(expansion) {
                settings.ensure_selected(&name);
            }
        }
        settings.resolve_filter(&self.orm);

        let statement = self.statements.list(&settings)?;
        let bindings = settings.bindings(&self.orm);
        let rows = self.execute(&statement, &bindings).await?.into_rows();

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut entity = self.to_entity(row, settings.select.as_deref());
            if let Some(expansion) = expansion.as_ref() {
                self.expand_entity(&mut entity, expansion).await?;
            }
            self.hooks.on_after_found(&mut entity)?;
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Primary key plus owner-side join keys the expansion reads
    fn join_columns(&self, expansion: &ExpansionTree) -> Vec<String> {
        let mut names = vec![self.orm.primary_key().name.clone()];
        for association in self.orm.associations() {
            if expansion.branch(&association.name).is_none() {
                continue;
            }
            if let Some(key) = association.owner_key() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.to_string());
                }
            }
        }
        names
    }
}
