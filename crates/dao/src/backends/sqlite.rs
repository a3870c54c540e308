//! SQLite Executor
//!
//! sqlx-backed [`SqlExecutor`] over a `SqlitePool`. Values come back by storage class,
//! so BOOLEAN columns read as the `"true"`/`"false"` text they were written with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};

use super::core::{PoolStats, ResultRow, SqlExecutor};
use crate::config::DatasourceConfig;
use crate::error::{DaoError, DaoResult};
use crate::statements::SqlDialect;
use crate::value::{BoundParameter, DatabaseValue};

/// SQLite statement executor
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: Arc<Pool<Sqlite>>,
}

impl SqliteExecutor {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        Self { pool }
    }

    /// Open a pool for the configured URL
    ///
    /// In-memory databases are pinned to one connection that never idles out.
    pub async fn connect(config: &DatasourceConfig) -> DaoResult<Self> {
        if !config.url.starts_with("sqlite:") {
            return Err(DaoError::Configuration("Invalid SQLite URL scheme".to_string()));
        }

        let mut options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if config.is_in_memory() {
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout_seconds.map(Duration::from_secs))
                .max_lifetime(config.max_lifetime_seconds.map(Duration::from_secs));
        }

        let pool = options
            .connect(&config.url)
            .await
            .map_err(|e| DaoError::Configuration(format!("Failed to create SQLite pool: {}", e)))?;

        tracing::info!("SQLite pool for datasource {} created", config.name);
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn prepare<'q>(sql: &'q str, params: &[BoundParameter]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        params.iter().fold(sqlx::query(sql), bind_parameter)
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn query(&self, sql: &str, params: &[BoundParameter]) -> DaoResult<Vec<ResultRow>> {
        let rows = Self::prepare(sql, params)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| DaoError::ExecutionFailed(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(sqlite_row_to_json).collect()
    }

    async fn update(&self, sql: &str, params: &[BoundParameter]) -> DaoResult<u64> {
        let result = Self::prepare(sql, params)
            .execute(&*self.pool)
            .await
            .map_err(|e| DaoError::ExecutionFailed(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    fn stats(&self) -> PoolStats {
        PoolStats::new(self.pool.size(), self.pool.num_idle() as u32)
    }

    async fn health_check(&self) -> DaoResult<Duration> {
        let start = Instant::now();

        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| DaoError::ExecutionFailed(format!("Health check failed: {}", e)))?;

        Ok(start.elapsed())
    }

    async fn close(&self) -> DaoResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn bind_parameter<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    parameter: &BoundParameter,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match &parameter.value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

fn sqlite_row_to_json(row: &SqliteRow) -> DaoResult<ResultRow> {
    let mut map = ResultRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), sqlite_value_to_json(row, index)?);
    }
    Ok(map)
}

/// Convert a SQLite value to JSON by its storage class
fn sqlite_value_to_json(row: &SqliteRow, index: usize) -> DaoResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" | "NUMERIC" => {
            let f = row.try_get::<f64, _>(index)?;
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(index)?),
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}
