//! Sequence generation over a statement executor
//!
//! PostgreSQL uses native sequences. SQLite emulates each sequence with an
//! AUTOINCREMENT table that only ever grows.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use serde_json::Value;

use super::core::{SequenceGenerator, SqlExecutor};
use crate::error::{DaoError, DaoResult};
use crate::security::{escape_identifier, validate_identifier};
use crate::statements::SqlDialect;

/// Sequences created lazily on first `nextval`
pub struct SqlSequences {
    executor: Arc<dyn SqlExecutor>,
    created: DashSet<String>,
}

impl SqlSequences {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            executor,
            created: DashSet::new(),
        }
    }

    async fn ensure_created(&self, name: &str) -> DaoResult<()> {
        if self.created.contains(name) {
            return Ok(());
        }
        let sql = match self.executor.dialect() {
            SqlDialect::PostgreSQL => format!("CREATE SEQUENCE IF NOT EXISTS {}", name),
            SqlDialect::SQLite => format!(
                "CREATE TABLE IF NOT EXISTS {} (ID INTEGER PRIMARY KEY AUTOINCREMENT)",
                escape_identifier(name)
            ),
        };
        self.executor.update(&sql, &[]).await?;
        tracing::debug!("Sequence {} is ready", name);
        self.created.insert(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl SequenceGenerator for SqlSequences {
    async fn nextval(&self, name: &str) -> DaoResult<i64> {
        validate_identifier("sequence", name)?;
        self.ensure_created(name).await?;

        let sql = match self.executor.dialect() {
            SqlDialect::PostgreSQL => format!("SELECT nextval('{}') AS NEXTVAL", name),
            SqlDialect::SQLite => format!("INSERT INTO {} DEFAULT VALUES RETURNING ID", escape_identifier(name)),
        };
        let rows = self.executor.query(&sql, &[]).await?;
        rows.first()
            .and_then(|row| row.values().next())
            .and_then(Value::as_i64)
            .ok_or_else(|| DaoError::ExecutionFailed(format!("Sequence {} returned no value", name)))
    }

    async fn drop_sequence(&self, name: &str) -> DaoResult<()> {
        validate_identifier("sequence", name)?;
        let sql = match self.executor.dialect() {
            SqlDialect::PostgreSQL => format!("DROP SEQUENCE IF EXISTS {}", name),
            SqlDialect::SQLite => format!("DROP TABLE IF EXISTS {}", escape_identifier(name)),
        };
        self.executor.update(&sql, &[]).await?;
        self.created.remove(name);
        tracing::debug!("Sequence {} dropped", name);
        Ok(())
    }
}
