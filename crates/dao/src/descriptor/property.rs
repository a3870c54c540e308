//! Property metadata - one persisted column of an ORM descriptor

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;
use crate::error::DaoError;

/// Declared SQL type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PropertyType {
    Varchar,
    Char,
    Text,
    Integer,
    Bigint,
    Smallint,
    Double,
    Float,
    Decimal,
    Boolean,
    Date,
    Time,
    Timestamp,
    Blob,
}

impl PropertyType {
    /// Canonical upper-case SQL name
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Varchar => "VARCHAR",
            PropertyType::Char => "CHAR",
            PropertyType::Text => "TEXT",
            PropertyType::Integer => "INTEGER",
            PropertyType::Bigint => "BIGINT",
            PropertyType::Smallint => "SMALLINT",
            PropertyType::Double => "DOUBLE",
            PropertyType::Float => "FLOAT",
            PropertyType::Decimal => "DECIMAL",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Date => "DATE",
            PropertyType::Time => "TIME",
            PropertyType::Timestamp => "TIMESTAMP",
            PropertyType::Blob => "BLOB",
        }
    }

    /// Whether `$filter` substring matching applies to this type
    pub fn is_varchar(self) -> bool {
        self == PropertyType::Varchar
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VARCHAR" => Ok(PropertyType::Varchar),
            "CHAR" => Ok(PropertyType::Char),
            "TEXT" | "CLOB" => Ok(PropertyType::Text),
            "INTEGER" | "INT" => Ok(PropertyType::Integer),
            "BIGINT" => Ok(PropertyType::Bigint),
            "SMALLINT" | "TINYINT" => Ok(PropertyType::Smallint),
            "DOUBLE" => Ok(PropertyType::Double),
            "FLOAT" | "REAL" => Ok(PropertyType::Float),
            "DECIMAL" | "NUMERIC" => Ok(PropertyType::Decimal),
            "BOOLEAN" | "BOOL" => Ok(PropertyType::Boolean),
            "DATE" => Ok(PropertyType::Date),
            "TIME" => Ok(PropertyType::Time),
            "TIMESTAMP" | "DATETIME" => Ok(PropertyType::Timestamp),
            "BLOB" => Ok(PropertyType::Blob),
            other => Err(DaoError::invalid(format!("unsupported property type '{}'", other))),
        }
    }
}

impl TryFrom<String> for PropertyType {
    type Error = DaoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PropertyType> for String {
    fn from(value: PropertyType) -> Self {
        value.as_str().to_string()
    }
}

/// DAO operations a property can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Remove,
}

/// Read transform applied to a column value when a row becomes an entity
pub type ValueTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Write transform producing the column value from the entity value and the whole entity
pub type DbValueTransform = Arc<dyn Fn(Option<&Value>, &Entity) -> Value + Send + Sync>;

/// A persisted property of an ORM descriptor
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub column: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Primary key marker
    #[serde(default)]
    pub id: bool,
    /// Mandatory: a value must be present on insert/update (NOT NULL column)
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_ops: Option<Vec<Operation>>,
    #[serde(skip)]
    pub value: Option<ValueTransform>,
    #[serde(skip)]
    pub db_value: Option<DbValueTransform>,
}

impl Property {
    pub fn new(name: impl Into<String>, column: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            property_type,
            size: None,
            id: false,
            required: false,
            unique: false,
            allowed_ops: None,
            value: None,
            db_value: None,
        }
    }

    /// Mark as the primary key (implies required)
    pub fn primary_key(mut self) -> Self {
        self.id = true;
        self.required = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn allowed_ops(mut self, ops: &[Operation]) -> Self {
        self.allowed_ops = Some(ops.to_vec());
        self
    }

    pub fn with_value<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.value = Some(Arc::new(transform));
        self
    }

    pub fn with_db_value<F>(mut self, transform: F) -> Self
    where
        F: Fn(Option<&Value>, &Entity) -> Value + Send + Sync + 'static,
    {
        self.db_value = Some(Arc::new(transform));
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.required
    }

    /// Whether the property takes part in `op`; unrestricted properties allow everything
    pub fn allows(&self, op: Operation) -> bool {
        self.allowed_ops
            .as_ref()
            .map_or(true, |ops| ops.contains(&op))
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("type", &self.property_type)
            .field("size", &self.size)
            .field("id", &self.id)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("allowed_ops", &self.allowed_ops)
            .field("value", &self.value.is_some())
            .field("db_value", &self.db_value.is_some())
            .finish()
    }
}
