//! # elif-dao: Metadata-driven Data Access Objects
//!
//! A [`Dao`] takes a declarative ORM descriptor (table, typed properties, primary key,
//! associations) and exposes CRUD, query and association expansion over a relational
//! backend without hand-written per-entity SQL.
//!
//! ```ignore
//! use elif_dao::{Dao, DaoOptions, Datasource, Entity, FindOptions, OrmDescriptor, Property, PropertyType};
//!
//! let datasource = Datasource::in_memory().await?;
//! let orm = OrmDescriptor::builder("T")
//!     .property(Property::new("id", "ID", PropertyType::Integer).primary_key())
//!     .property(Property::new("name", "NAME", PropertyType::Varchar).unique())
//!     .build()?;
//! let dao = Dao::create(orm, &datasource, DaoOptions::new())?;
//! dao.create_table().await?;
//!
//! let id = dao.insert(Entity::new().with("name", "a")).await?;
//! let found = dao.find(id, FindOptions::new()).await?;
//! ```
//!
//! Statements run one at a time on the caller's task. The only consistency net is the
//! per-row compensation of a failed insert; there are no cross-statement transactions.

pub mod backends;
pub mod config;
pub mod dao;
pub mod datasource;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod security;
pub mod settings;
pub mod statements;
pub mod value;

pub use backends::{PostgresExecutor, SequenceGenerator, SqlExecutor, SqlSequences, SqliteExecutor};
pub use config::{DatasourceConfig, OrmDefinition};
pub use dao::{Dao, DaoHooks, DaoOptions, ExpandContext, JoinDaos, JoinTableLister, ListJoins};
pub use datasource::Datasource;
pub use descriptor::{Association, AssociationType, Operation, OrmDescriptor, Property, PropertyType};
pub use entity::Entity;
pub use error::{DaoError, DaoResult};
pub use settings::{FindOptions, FindQuery, QuerySettings};
pub use statements::{ParametricStatement, SqlDialect, StatementBuilder};
