//! Statement Builder Adapter
//!
//! Turns a descriptor plus query settings into parametrized statements. The DAO never
//! looks inside the SQL text except for [`ParametricStatement::is_query`], so builders
//! must render every read as a statement starting with `SELECT`.

pub mod builder;
pub mod dialect;

use std::fmt;

pub use builder::OrmStatements;
pub use dialect::SqlDialect;

use crate::descriptor::{Property, PropertyType};
use crate::error::DaoResult;
use crate::settings::QuerySettings;

/// A bind placeholder: the property whose value fills it and its declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementParameter {
    pub name: String,
    pub property_type: PropertyType,
}

impl From<&Property> for StatementParameter {
    fn from(property: &Property) -> Self {
        Self {
            name: property.name.clone(),
            property_type: property.property_type,
        }
    }
}

/// SQL text plus its placeholders in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametricStatement {
    sql: String,
    parameters: Vec<StatementParameter>,
}

impl ParametricStatement {
    pub fn new(sql: impl Into<String>, parameters: Vec<StatementParameter>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    pub fn build(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[StatementParameter] {
        &self.parameters
    }

    /// Read vs write, by case-insensitive `SELECT` prefix
    pub fn is_query(&self) -> bool {
        self.sql
            .trim_start()
            .get(..6)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("select"))
    }
}

impl fmt::Display for ParametricStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Narrow statement-building interface consumed by the DAO
pub trait StatementBuilder: Send + Sync {
    /// Select by primary key, optionally restricted to the named properties
    fn find(&self, select: Option<&[String]>) -> DaoResult<ParametricStatement>;

    /// Select honoring the list settings (conditions, `$filter`, sort, paging)
    fn list(&self, settings: &QuerySettings) -> DaoResult<ParametricStatement>;

    /// Insert of every declared property
    fn insert(&self) -> DaoResult<ParametricStatement>;

    /// Update by primary key of every updatable property
    fn update(&self) -> DaoResult<ParametricStatement>;

    /// Delete by primary key
    fn delete(&self) -> DaoResult<ParametricStatement>;

    fn count(&self) -> DaoResult<ParametricStatement>;

    /// Probe for rows holding the property value
    fn unique_check(&self, property: &Property) -> DaoResult<ParametricStatement>;

    fn create_table(&self) -> DaoResult<ParametricStatement>;

    fn drop_table(&self) -> DaoResult<ParametricStatement>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_query_prefix() {
        assert!(ParametricStatement::new("SELECT * FROM T", vec![]).is_query());
        assert!(ParametricStatement::new("  select id from t", vec![]).is_query());
        assert!(!ParametricStatement::new("INSERT INTO T (ID) VALUES (?)", vec![]).is_query());
        assert!(!ParametricStatement::new("DROP TABLE T", vec![]).is_query());
        assert!(!ParametricStatement::new("SEL", vec![]).is_query());
    }
}
