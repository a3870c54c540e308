//! DAO - CRUD engine and association expander over one descriptor
//!
//! A [`Dao`] owns its descriptor, a statement builder, the name of its primary-key
//! sequence and a log context. It keeps no per-call state, so a shared `Arc<Dao>` can
//! serve concurrent callers as long as the datasource can.
//!
//! Operations that recurse into other DAOs (cascading insert/remove, find/list with
//! expansion) return boxed futures.

mod crud;
mod expand;
pub mod hooks;
pub mod joins;
mod query;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

pub use expand::ExpandContext;
pub use hooks::DaoHooks;
pub use joins::{JoinDaos, JoinTableLister, ListJoins};

use crate::backends::ResultRow;
use crate::datasource::Datasource;
use crate::descriptor::{OrmDescriptor, Property, PropertyType};
use crate::entity::Entity;
use crate::error::{DaoError, DaoResult};
use crate::security::validate_identifier;
use crate::statements::{OrmStatements, ParametricStatement, SqlDialect, StatementBuilder};
use crate::value::{coerce, decode, BoundParameter};

/// Construction options of a [`Dao`]
#[derive(Clone, Default)]
pub struct DaoOptions {
    log_context: Option<String>,
    hooks: DaoHooks,
    join_lister: Option<Arc<dyn ListJoins>>,
}

impl DaoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger context name, `db.dao.<table>` when not given
    pub fn log_context(mut self, name: impl Into<String>) -> Self {
        self.log_context = Some(name.into());
        self
    }

    pub fn hooks(mut self, hooks: DaoHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Make the DAO usable as the join DAO of many-to-many associations
    pub fn join_lister<L>(mut self, lister: L) -> Self
    where
        L: ListJoins + 'static,
    {
        self.join_lister = Some(Arc::new(lister));
        self
    }
}

impl fmt::Debug for DaoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaoOptions")
            .field("log_context", &self.log_context)
            .field("hooks", &self.hooks)
            .field("join_lister", &self.join_lister.is_some())
            .finish()
    }
}

/// Outcome of a statement: rows for reads, affected count for writes
#[derive(Debug)]
pub(crate) enum Executed {
    Rows(Vec<ResultRow>),
    Affected(u64),
}

impl Executed {
    pub(crate) fn into_rows(self) -> Vec<ResultRow> {
        match self {
            Executed::Rows(rows) => rows,
            Executed::Affected(_) => Vec::new(),
        }
    }

    pub(crate) fn affected(&self) -> u64 {
        match self {
            Executed::Rows(rows) => rows.len() as u64,
            Executed::Affected(count) => *count,
        }
    }
}

/// Data access object for one descriptor over one datasource
pub struct Dao {
    orm: Arc<OrmDescriptor>,
    statements: Arc<dyn StatementBuilder>,
    datasource: Datasource,
    sequence_name: String,
    log_context: String,
    hooks: DaoHooks,
    join_lister: Option<Arc<dyn ListJoins>>,
}

impl Dao {
    /// Build a DAO for `descriptor` over `datasource`
    pub fn create(mut descriptor: OrmDescriptor, datasource: &Datasource, options: DaoOptions) -> DaoResult<Arc<Self>> {
        if datasource.dialect() == SqlDialect::PostgreSQL {
            descriptor.lowercase_columns();
        }

        let sequence_name = format!(
            "{}_{}",
            descriptor.table(),
            descriptor.primary_key().name.to_uppercase()
        );
        validate_identifier("sequence", &sequence_name)?;

        let log_context = options.log_context.unwrap_or_else(|| {
            if descriptor.table().is_empty() {
                "db.dao".to_string()
            } else {
                format!("db.dao.{}", descriptor.table().to_lowercase())
            }
        });

        let orm = Arc::new(descriptor);
        let statements: Arc<dyn StatementBuilder> = Arc::new(OrmStatements::new(orm.clone(), datasource.dialect()));

        tracing::debug!(dao = %log_context, "DAO for {} created on datasource {}", orm.table(), datasource.name());

        Ok(Arc::new(Self {
            orm,
            statements,
            datasource: datasource.clone(),
            sequence_name,
            log_context,
            hooks: options.hooks,
            join_lister: options.join_lister,
        }))
    }

    pub fn orm(&self) -> &OrmDescriptor {
        &self.orm
    }

    pub fn table(&self) -> &str {
        self.orm.table()
    }

    /// Primary-key sequence: `TABLE_PKNAME`
    pub fn sequence_name(&self) -> &str {
        &self.sequence_name
    }

    pub fn log_context(&self) -> &str {
        &self.log_context
    }

    pub fn datasource(&self) -> &Datasource {
        &self.datasource
    }

    pub fn statements(&self) -> &dyn StatementBuilder {
        self.statements.as_ref()
    }

    pub(crate) fn join_lister(&self) -> Option<&Arc<dyn ListJoins>> {
        self.join_lister.as_ref()
    }

    /// Property lookup for names other descriptors reference on this one
    pub(crate) fn require_property(&self, name: &str, referrer: &str) -> DaoResult<&Property> {
        self.orm.property(name).ok_or_else(|| {
            DaoError::invalid(format!(
                "{} references unknown {} property '{}'",
                referrer,
                self.orm.table(),
                name
            ))
        })
    }

    /// Bind and run a statement
    ///
    /// Reads omit parameters whose value is unset; writes bind them as NULL.
    pub(crate) async fn execute(
        &self,
        statement: &ParametricStatement,
        bindings: &Map<String, Value>,
    ) -> DaoResult<Executed> {
        let sql = statement.build();
        if sql.trim().is_empty() {
            return Err(DaoError::invalid(format!("statement builder produced empty SQL for {}", self.table())));
        }
        tracing::info!(dao = %self.log_context, "Executing SQL Statement: {}", sql);

        let is_query = statement.is_query();
        let mut parameters = Vec::with_capacity(statement.parameters().len());
        for (index, parameter) in statement.parameters().iter().enumerate() {
            let raw = bindings.get(&parameter.name).unwrap_or(&Value::Null);
            if is_query && raw.is_null() {
                tracing::debug!(dao = %self.log_context, "Omitting unset parameter[{}] {}", index, parameter.name);
                continue;
            }
            let value = coerce(parameter.property_type, raw)?;
            tracing::debug!(dao = %self.log_context, "Binding to parameter[{}]: {:?}", index, value);
            parameters.push(BoundParameter::new(parameter.property_type, value));
        }

        let executor = self.datasource.executor();
        if is_query {
            Ok(Executed::Rows(executor.query(sql, &parameters).await?))
        } else {
            Ok(Executed::Affected(executor.update(sql, &parameters).await?))
        }
    }

    /// Row image written by insert/update: declared properties only, write transforms
    /// applied, unset BOOLEAN values written as false
    pub(crate) fn to_row_image(&self, entity: &Entity) -> Entity {
        let mut image = Map::with_capacity(self.orm.properties().len());
        for property in self.orm.properties() {
            let current = entity.get(&property.name);
            let value = match &property.db_value {
                Some(transform) => transform(current, entity),
                None => current.cloned().unwrap_or(Value::Null),
            };
            let value = match (property.property_type, value) {
                (PropertyType::Boolean, Value::Null) => Value::Bool(false),
                (_, value) => value,
            };
            image.insert(property.name.clone(), value);
        }
        let image = Entity::from(image);
        tracing::debug!(
            dao = %self.log_context,
            "Transformation to {}{} DB JSON object finished",
            self.table(),
            id_segment(image.get(&self.orm.primary_key().name))
        );
        image
    }

    /// Map a result row to an entity, restricted to `select` when given
    pub(crate) fn to_entity(&self, row: &ResultRow, select: Option<&[String]>) -> Entity {
        let selected = |property: &&Property| {
            select
                .filter(|names| !names.is_empty())
                .map_or(true, |names| names.iter().any(|n| n == &property.name))
        };

        let mut entity = Entity::new();
        for property in self.orm.properties().iter().filter(selected) {
            let raw = column_value(row, &property.column).cloned().unwrap_or(Value::Null);
            let value = decode(property.property_type, raw).unwrap_or(Value::Null);
            let value = match &property.value {
                Some(transform) => transform(value),
                None => value,
            };
            entity.set(property.name.clone(), value);
        }
        tracing::debug!(
            dao = %self.log_context,
            "Transformation from {}{} DB JSON object finished",
            self.table(),
            id_segment(entity.get(&self.orm.primary_key().name))
        );
        entity
    }

    /// Every mandatory property other than BOOLEAN ones and `skip` must be set
    pub(crate) fn validate_entity(&self, entity: &Entity, skip: &[&str]) -> DaoResult<()> {
        for property in self.orm.mandatory_properties() {
            if skip.contains(&property.name.as_str()) || property.property_type == PropertyType::Boolean {
                continue;
            }
            if !entity.is_set(&property.name) {
                return Err(DaoError::ValidationFailed {
                    table: self.table().to_string(),
                    property: property.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Dao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dao")
            .field("table", &self.orm.table())
            .field("sequence_name", &self.sequence_name)
            .field("log_context", &self.log_context)
            .field("datasource", &self.datasource)
            .finish()
    }
}

/// Column lookup tolerating label case folding by the backend
fn column_value<'r>(row: &'r ResultRow, column: &str) -> Option<&'r Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

fn id_segment(id: Option<&Value>) -> String {
    id.map(|id| format!("[{}]", display_value(id))).unwrap_or_default()
}

/// Strings without JSON quotes, everything else as JSON text
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
