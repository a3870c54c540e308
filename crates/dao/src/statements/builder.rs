//! Descriptor-driven SQL generation

use std::sync::Arc;

use super::{ParametricStatement, SqlDialect, StatementBuilder, StatementParameter};
use crate::descriptor::{Operation, OrmDescriptor, Property};
use crate::error::{DaoError, DaoResult};
use crate::settings::{split_comparison, ComparisonOperator, QuerySettings};

/// Statement builder over a validated descriptor
#[derive(Debug, Clone)]
pub struct OrmStatements {
    orm: Arc<OrmDescriptor>,
    dialect: SqlDialect,
}

impl OrmStatements {
    pub fn new(orm: Arc<OrmDescriptor>, dialect: SqlDialect) -> Self {
        Self { orm, dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Resolve a selection to properties, rejecting undeclared names and dropping repeats
    fn selected(&self, select: Option<&[String]>) -> DaoResult<Vec<&Property>> {
        let Some(names) = select.filter(|names| !names.is_empty()) else {
            return Ok(self.orm.properties().iter().collect());
        };
        let mut properties: Vec<&Property> = Vec::with_capacity(names.len());
        for name in names {
            let property = self.orm.property(name).ok_or_else(|| {
                DaoError::invalid(format!("select name {} is not a property of {}", name, self.orm.table()))
            })?;
            if !properties.iter().any(|p| p.name == property.name) {
                properties.push(property);
            }
        }
        Ok(properties)
    }

    fn select_clause(&self, properties: &[&Property]) -> String {
        let columns: Vec<&str> = properties.iter().map(|p| p.column.as_str()).collect();
        format!("SELECT {} FROM {}", columns.join(", "), self.orm.table())
    }

    fn placeholder(&self, parameters: &[StatementParameter], property: &Property) -> String {
        self.dialect.parameter_placeholder(parameters.len(), property.property_type)
    }

    fn order_clause(&self, settings: &QuerySettings) -> DaoResult<String> {
        let Some(sort) = settings.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(String::new());
        };
        let direction = match settings.order.as_deref().map(str::trim) {
            None | Some("") => "",
            Some(order) if order.eq_ignore_ascii_case("asc") => " ASC",
            Some(order) if order.eq_ignore_ascii_case("desc") => " DESC",
            Some(order) => return Err(DaoError::invalid(format!("$order must be ASC or DESC but was {}", order))),
        };
        let mut columns = Vec::new();
        for name in sort.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let property = self.orm.property(name).ok_or_else(|| {
                DaoError::invalid(format!("$sort name {} is not a property of {}", name, self.orm.table()))
            })?;
            columns.push(format!("{}{}", property.column, direction));
        }
        Ok(format!(" ORDER BY {}", columns.join(", ")))
    }
}

impl StatementBuilder for OrmStatements {
    fn find(&self, select: Option<&[String]>) -> DaoResult<ParametricStatement> {
        let properties = self.selected(select)?;
        let primary_key = self.orm.primary_key();

        let mut sql = self.select_clause(&properties);
        let mut parameters = Vec::with_capacity(1);
        sql.push_str(&format!(
            " WHERE {} = {}",
            primary_key.column,
            self.placeholder(&parameters, primary_key)
        ));
        parameters.push(StatementParameter::from(primary_key));

        Ok(ParametricStatement::new(sql, parameters))
    }

    fn list(&self, settings: &QuerySettings) -> DaoResult<ParametricStatement> {
        let properties = self.selected(settings.select.as_deref())?;
        let mut sql = self.select_clause(&properties);
        let mut parameters = Vec::new();

        let mut predicates = Vec::new();
        for property in self.orm.properties() {
            let Some(value) = settings.conditions.get(&property.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let operator = if settings.is_filtered(&property.name) {
                ComparisonOperator::Like
            } else {
                split_comparison(value).0
            };
            predicates.push(format!(
                "{} {} {}",
                property.column,
                operator.as_sql(),
                self.placeholder(&parameters, property)
            ));
            parameters.push(StatementParameter::from(property));
        }
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        sql.push_str(&self.order_clause(settings)?);
        sql.push_str(&self.dialect.limit_offset(settings.limit, settings.offset));

        Ok(ParametricStatement::new(sql, parameters))
    }

    fn insert(&self) -> DaoResult<ParametricStatement> {
        let mut columns = Vec::with_capacity(self.orm.properties().len());
        let mut placeholders = Vec::with_capacity(self.orm.properties().len());
        let mut parameters = Vec::with_capacity(self.orm.properties().len());
        for property in self.orm.properties() {
            columns.push(property.column.as_str());
            placeholders.push(self.placeholder(&parameters, property));
            parameters.push(StatementParameter::from(property));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.orm.table(),
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(ParametricStatement::new(sql, parameters))
    }

    fn update(&self) -> DaoResult<ParametricStatement> {
        let primary_key = self.orm.primary_key();
        let mut assignments = Vec::new();
        let mut parameters = Vec::new();
        for property in self.orm.properties() {
            if property.id || !property.allows(Operation::Update) {
                continue;
            }
            assignments.push(format!("{} = {}", property.column, self.placeholder(&parameters, property)));
            parameters.push(StatementParameter::from(property));
        }
        if assignments.is_empty() {
            return Err(DaoError::invalid(format!("{} declares no updatable properties", self.orm.table())));
        }

        let mut sql = format!("UPDATE {} SET {}", self.orm.table(), assignments.join(", "));
        sql.push_str(&format!(
            " WHERE {} = {}",
            primary_key.column,
            self.placeholder(&parameters, primary_key)
        ));
        parameters.push(StatementParameter::from(primary_key));

        Ok(ParametricStatement::new(sql, parameters))
    }

    fn delete(&self) -> DaoResult<ParametricStatement> {
        let primary_key = self.orm.primary_key();
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.orm.table(),
            primary_key.column,
            self.dialect.parameter_placeholder(0, primary_key.property_type)
        );
        Ok(ParametricStatement::new(sql, vec![StatementParameter::from(primary_key)]))
    }

    fn count(&self) -> DaoResult<ParametricStatement> {
        Ok(ParametricStatement::new(
            format!("SELECT COUNT(*) AS COUNT FROM {}", self.orm.table()),
            Vec::new(),
        ))
    }

    fn unique_check(&self, property: &Property) -> DaoResult<ParametricStatement> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            property.column,
            self.orm.table(),
            property.column,
            self.dialect.parameter_placeholder(0, property.property_type)
        );
        Ok(ParametricStatement::new(sql, vec![StatementParameter::from(property)]))
    }

    fn create_table(&self) -> DaoResult<ParametricStatement> {
        let definitions: Vec<String> = self
            .orm
            .properties()
            .iter()
            .map(|property| {
                let mut definition = format!(
                    "{} {}",
                    property.column,
                    self.dialect.column_type(property.property_type, property.size)
                );
                if property.id {
                    definition.push_str(" NOT NULL PRIMARY KEY");
                } else {
                    if property.required {
                        definition.push_str(" NOT NULL");
                    }
                    if property.unique {
                        definition.push_str(" UNIQUE");
                    }
                }
                definition
            })
            .collect();

        Ok(ParametricStatement::new(
            format!("CREATE TABLE {} ({})", self.orm.table(), definitions.join(", ")),
            Vec::new(),
        ))
    }

    fn drop_table(&self) -> DaoResult<ParametricStatement> {
        Ok(ParametricStatement::new(format!("DROP TABLE {}", self.orm.table()), Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PropertyType;

    fn statements(dialect: SqlDialect) -> OrmStatements {
        let orm = OrmDescriptor::builder("STUDENTS")
            .property(Property::new("id", "ID", PropertyType::Integer).primary_key())
            .property(Property::new("name", "NAME", PropertyType::Varchar).size(20).required().unique())
            .property(Property::new("age", "AGE", PropertyType::Integer))
            .property(Property::new("born", "BORN", PropertyType::Date))
            .property(Property::new("code", "CODE", PropertyType::Varchar).allowed_ops(&[Operation::Insert]))
            .build()
            .unwrap();
        OrmStatements::new(Arc::new(orm), dialect)
    }

    fn names(statement: &ParametricStatement) -> Vec<&str> {
        statement.parameters().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_find_by_primary_key() {
        let st = statements(SqlDialect::SQLite);
        let all = st.find(None).unwrap();
        assert_eq!(all.build(), "SELECT ID, NAME, AGE, BORN, CODE FROM STUDENTS WHERE ID = ?");
        assert_eq!(names(&all), vec!["id"]);

        let some = st
            .find(Some(&["name".to_string(), "name".to_string(), "id".to_string()]))
            .unwrap();
        assert_eq!(some.build(), "SELECT NAME, ID FROM STUDENTS WHERE ID = ?");

        assert!(matches!(
            st.find(Some(&["nope".to_string()])),
            Err(DaoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_list_conditions_follow_property_order() {
        let st = statements(SqlDialect::PostgreSQL);
        let mut settings = QuerySettings::new()
            .condition("age", ">=18")
            .condition("name", "bo")
            .condition("unknown", 1)
            .filter(["name"]);
        settings.resolve_filter(&st.orm);

        let statement = st.list(&settings).unwrap();
        assert_eq!(
            statement.build(),
            "SELECT ID, NAME, AGE, BORN, CODE FROM STUDENTS WHERE NAME LIKE $1 AND AGE >= $2"
        );
        assert_eq!(names(&statement), vec!["name", "age"]);
        assert!(statement.is_query());
    }

    #[test]
    fn test_list_sort_and_paging() {
        let st = statements(SqlDialect::SQLite);
        let settings = QuerySettings::new().sort("name, age").order("desc").limit(10).offset(20);
        assert_eq!(
            st.list(&settings).unwrap().build(),
            "SELECT ID, NAME, AGE, BORN, CODE FROM STUDENTS ORDER BY NAME DESC, AGE DESC LIMIT 10 OFFSET 20"
        );

        assert!(st.list(&QuerySettings::new().sort("bogus")).is_err());
        assert!(st.list(&QuerySettings::new().sort("name").order("sideways")).is_err());
    }

    #[test]
    fn test_temporal_placeholders_are_cast_on_postgres() {
        let st = statements(SqlDialect::PostgreSQL);
        let insert = st.insert().unwrap();
        assert_eq!(
            insert.build(),
            "INSERT INTO STUDENTS (ID, NAME, AGE, BORN, CODE) VALUES ($1, $2, $3, CAST($4 AS DATE), $5)"
        );
        assert_eq!(names(&insert), vec!["id", "name", "age", "born", "code"]);
    }

    #[test]
    fn test_update_skips_primary_key_and_insert_only_properties() {
        let st = statements(SqlDialect::PostgreSQL);
        let update = st.update().unwrap();
        assert_eq!(
            update.build(),
            "UPDATE STUDENTS SET NAME = $1, AGE = $2, BORN = CAST($3 AS DATE) WHERE ID = $4"
        );
        assert_eq!(names(&update), vec!["name", "age", "born", "id"]);
        assert!(!update.is_query());
    }

    #[test]
    fn test_ddl_and_counts() {
        let st = statements(SqlDialect::SQLite);
        assert_eq!(
            st.create_table().unwrap().build(),
            "CREATE TABLE STUDENTS (ID INTEGER NOT NULL PRIMARY KEY, NAME VARCHAR(20) NOT NULL UNIQUE, \
             AGE INTEGER, BORN DATE, CODE VARCHAR(255))"
        );
        assert_eq!(st.drop_table().unwrap().build(), "DROP TABLE STUDENTS");
        assert_eq!(st.delete().unwrap().build(), "DELETE FROM STUDENTS WHERE ID = ?");
        assert!(st.count().unwrap().is_query());

        let name = st.orm.property("name").unwrap().clone();
        assert_eq!(
            st.unique_check(&name).unwrap().build(),
            "SELECT NAME FROM STUDENTS WHERE NAME = ?"
        );
    }
}
