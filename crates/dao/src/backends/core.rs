//! Core execution contracts
//!
//! The DAO talks to a database only through [`SqlExecutor`] (statements with bound
//! parameters in, rows or affected counts out) and [`SequenceGenerator`] (named
//! monotonically increasing sequences).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::DaoResult;
use crate::statements::SqlDialect;
use crate::value::BoundParameter;

/// One result row: column label → value
pub type ResultRow = Map<String, Value>;

/// Statement execution over a connection pool
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Run a statement returning rows
    async fn query(&self, sql: &str, params: &[BoundParameter]) -> DaoResult<Vec<ResultRow>>;

    /// Run a statement returning the affected row count
    async fn update(&self, sql: &str, params: &[BoundParameter]) -> DaoResult<u64>;

    fn stats(&self) -> PoolStats;

    async fn health_check(&self) -> DaoResult<Duration>;

    async fn close(&self) -> DaoResult<()>;
}

/// Named sequence source used for primary keys
#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    /// Next value of the named sequence, creating the sequence on first use
    async fn nextval(&self, name: &str) -> DaoResult<i64>;

    async fn drop_sequence(&self, name: &str) -> DaoResult<()>;
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
}

impl PoolStats {
    pub(crate) fn new(total: u32, idle: u32) -> Self {
        Self {
            total_connections: total,
            idle_connections: idle,
            active_connections: total.saturating_sub(idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_stats_active_count() {
        let stats = PoolStats::new(5, 2);
        assert_eq!(stats.active_connections, 3);
        assert_eq!(PoolStats::new(1, 4).active_connections, 0);
    }
}
