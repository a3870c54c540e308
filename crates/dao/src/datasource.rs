//! Datasource - a named executor plus the sequences living in the same database

use std::fmt;
use std::sync::Arc;

use crate::backends::{PostgresExecutor, SequenceGenerator, SqlExecutor, SqlSequences, SqliteExecutor};
use crate::config::{DatasourceConfig, DEFAULT_DATASOURCE_NAME};
use crate::error::DaoResult;
use crate::statements::SqlDialect;

/// Execution collaborators shared by every DAO created over the same database
#[derive(Clone)]
pub struct Datasource {
    name: String,
    executor: Arc<dyn SqlExecutor>,
    sequences: Arc<dyn SequenceGenerator>,
}

impl Datasource {
    /// Assemble a datasource from existing collaborators
    pub fn new(
        name: impl Into<String>,
        executor: Arc<dyn SqlExecutor>,
        sequences: Arc<dyn SequenceGenerator>,
    ) -> Self {
        Self {
            name: name.into(),
            executor,
            sequences,
        }
    }

    /// Wrap an executor, generating sequences through it
    pub fn with_executor(name: impl Into<String>, executor: Arc<dyn SqlExecutor>) -> Self {
        let sequences: Arc<dyn SequenceGenerator> = Arc::new(SqlSequences::new(executor.clone()));
        Self::new(name, executor, sequences)
    }

    /// Open a pool for the configured URL, picking the backend from its scheme
    pub async fn connect(config: &DatasourceConfig) -> DaoResult<Self> {
        config.validate()?;
        let executor: Arc<dyn SqlExecutor> = match config.dialect()? {
            SqlDialect::PostgreSQL => Arc::new(PostgresExecutor::connect(config).await?),
            SqlDialect::SQLite => Arc::new(SqliteExecutor::connect(config).await?),
        };
        tracing::info!("Datasource {} connected ({})", config.name, executor.dialect());
        Ok(Self::with_executor(config.name.clone(), executor))
    }

    /// Connect using `DATABASE_URL` and friends
    pub async fn from_env() -> DaoResult<Self> {
        Self::connect(&DatasourceConfig::from_env()?).await
    }

    /// Private in-memory SQLite database
    pub async fn in_memory() -> DaoResult<Self> {
        Self::connect(&DatasourceConfig::new("sqlite::memory:").name(DEFAULT_DATASOURCE_NAME)).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> SqlDialect {
        self.executor.dialect()
    }

    pub fn executor(&self) -> &Arc<dyn SqlExecutor> {
        &self.executor
    }

    pub fn sequences(&self) -> &Arc<dyn SequenceGenerator> {
        &self.sequences
    }

    pub async fn close(&self) -> DaoResult<()> {
        self.executor.close().await?;
        tracing::info!("Datasource {} closed", self.name);
        Ok(())
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("name", &self.name)
            .field("dialect", &self.dialect())
            .finish()
    }
}
