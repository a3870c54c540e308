//! Many-to-many resolution through a join DAO

use async_trait::async_trait;

use super::Dao;
use crate::entity::Entity;
use crate::error::DaoResult;
use crate::settings::{FindOptions, QuerySettings};

/// The DAOs collaborating in a many-to-many expansion
#[derive(Clone, Copy)]
pub struct JoinDaos<'a> {
    /// DAO owning the association
    pub source: &'a Dao,
    /// DAO over the join table
    pub join: &'a Dao,
    /// DAO over the associated entities
    pub target: &'a Dao,
}

/// Capability of a join DAO to resolve the targets joined to a source entity
///
/// `settings` carries a single condition: the association's `joinKey` equal to the
/// source entity's key value.
#[async_trait]
pub trait ListJoins: Send + Sync {
    async fn list_joins(&self, settings: QuerySettings, daos: JoinDaos<'_>) -> DaoResult<Vec<Entity>>;
}

/// Lists join rows, then finds each target by the join row's `target_key`
#[derive(Debug, Clone)]
pub struct JoinTableLister {
    target_key: String,
}

impl JoinTableLister {
    pub fn new(target_key: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
        }
    }
}

#[async_trait]
impl ListJoins for JoinTableLister {
    async fn list_joins(&self, settings: QuerySettings, daos: JoinDaos<'_>) -> DaoResult<Vec<Entity>> {
        daos.join.require_property(&self.target_key, "join table lister")?;

        let joins = daos.join.list(settings).await?;
        let mut targets = Vec::with_capacity(joins.len());
        for join in &joins {
            let Some(target_id) = join.get(&self.target_key) else {
                continue;
            };
            if let Some(target) = daos.target.find(target_id.clone(), FindOptions::new()).await? {
                targets.push(target);
            }
        }

        tracing::debug!(
            dao = %daos.source.log_context(),
            "{} join rows in {} resolved to {} {} entities",
            joins.len(),
            daos.join.table(),
            targets.len(),
            daos.target.table()
        );
        Ok(targets)
    }
}
