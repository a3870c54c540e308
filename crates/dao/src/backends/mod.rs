//! Database Backends
//!
//! sqlx-backed executors for PostgreSQL and SQLite, plus the sequence generator built
//! on top of any executor.

pub mod core;
pub mod postgres;
pub mod sequence;
pub mod sqlite;

pub use self::core::*;
pub use postgres::PostgresExecutor;
pub use sequence::SqlSequences;
pub use sqlite::SqliteExecutor;
