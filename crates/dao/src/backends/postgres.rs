//! PostgreSQL Executor
//!
//! sqlx-backed [`SqlExecutor`] over a `PgPool`. Parameters are bound by their declared
//! property type so NULLs and BOOLEAN strings reach the server with the right type.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Pool, Postgres, Row, TypeInfo, ValueRef};

use super::core::{PoolStats, ResultRow, SqlExecutor};
use crate::config::DatasourceConfig;
use crate::descriptor::PropertyType;
use crate::error::{DaoError, DaoResult};
use crate::statements::SqlDialect;
use crate::value::{BoundParameter, DatabaseValue};

/// PostgreSQL statement executor
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresExecutor {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Open a pool for the configured URL
    pub async fn connect(config: &DatasourceConfig) -> DaoResult<Self> {
        validate_database_url(&config.url)?;

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options
            .connect(&config.url)
            .await
            .map_err(|e| DaoError::Configuration(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::info!("PostgreSQL pool for datasource {} created", config.name);
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    fn prepare<'q>(sql: &'q str, params: &[BoundParameter]) -> Query<'q, Postgres, PgArguments> {
        params.iter().fold(sqlx::query(sql), bind_parameter)
    }
}

fn validate_database_url(url: &str) -> DaoResult<()> {
    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
        return Err(DaoError::Configuration("Invalid PostgreSQL URL scheme".to_string()));
    }
    Ok(())
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn query(&self, sql: &str, params: &[BoundParameter]) -> DaoResult<Vec<ResultRow>> {
        let rows = Self::prepare(sql, params)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| DaoError::ExecutionFailed(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(postgres_row_to_json).collect()
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

/// Bind a coerced value with the SQL type its property declares
fn bind_parameter<'q>(
    query: Query<'q, Postgres, PgArguments>,
    parameter: &BoundParameter,
) -> Query<'q, Postgres, PgArguments> {
    match (&parameter.value, parameter.property_type) {
        (DatabaseValue::Null, PropertyType::Integer | PropertyType::Bigint | PropertyType::Smallint) => {
            query.bind(Option::<i64>::None)
        }
        (DatabaseValue::Null, PropertyType::Double | PropertyType::Float | PropertyType::Decimal) => {
            query.bind(Option::<f64>::None)
        }
        (DatabaseValue::Null, PropertyType::Boolean) => query.bind(Option::<bool>::None),
        (DatabaseValue::Null, PropertyType::Blob) => query.bind(Option::<Vec<u8>>::None),
        (DatabaseValue::Null, _) => query.bind(Option::<String>::None),
        (DatabaseValue::String(s), PropertyType::Boolean) if s == "true" || s == "false" => query.bind(s == "true"),
        (DatabaseValue::Bool(b), _) => query.bind(*b),
        (DatabaseValue::Int64(i), _) => query.bind(*i),
        (DatabaseValue::Float64(f), _) => query.bind(*f),
        (DatabaseValue::String(s), _) => query.bind(s.clone()),
        (DatabaseValue::Json(j), _) => query.bind(j.clone()),
    }
}

fn postgres_row_to_json(row: &PgRow) -> DaoResult<ResultRow> {
    let mut map = ResultRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), postgres_value_to_json(row, index)?);
    }
    Ok(map)
}

/// Convert a PostgreSQL column value to JSON; temporal values become their ISO text
fn postgres_value_to_json(row: &PgRow, index: usize) -> DaoResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => float(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => float(row.try_get::<f64, _>(index)?),
        "BYTEA" => Value::from(row.try_get::<Vec<u8>, _>(index)?),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::String(row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(row.try_get::<chrono::NaiveDateTime, _>(index)?.to_string()),
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<chrono::NaiveTime, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        _ => Value::String(row.try_get::<String, _>(index).map_err(|e| {
            DaoError::ExecutionFailed(format!(
                "Failed to get value as string for unknown type '{}': {}",
                type_name, e
            ))
        })?),
    };
    Ok(value)
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
