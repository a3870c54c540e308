//! SQL dialects supported by the statement builder

use std::fmt;
use std::str::FromStr;

use crate::descriptor::PropertyType;
use crate::error::DaoError;

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Placeholder for the zero-based parameter `index` of declared type `property_type`
    pub fn parameter_placeholder(&self, index: usize, property_type: PropertyType) -> String {
        match self {
            SqlDialect::PostgreSQL => match property_type {
                PropertyType::Date | PropertyType::Time | PropertyType::Timestamp => {
                    format!("CAST(${} AS {})", index + 1, property_type)
                }
                _ => format!("${}", index + 1),
            },
            SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Column type used in CREATE TABLE
    pub fn column_type(&self, property_type: PropertyType, size: Option<u32>) -> String {
        match (self, property_type) {
            (_, PropertyType::Varchar) => format!("VARCHAR({})", size.unwrap_or(255)),
            (_, PropertyType::Char) => format!("CHAR({})", size.unwrap_or(1)),
            (_, PropertyType::Decimal) => match size {
                Some(size) => format!("DECIMAL({})", size),
                None => "DECIMAL".to_string(),
            },
            (_, PropertyType::Double) => "DOUBLE PRECISION".to_string(),
            (_, PropertyType::Float) => "REAL".to_string(),
            (SqlDialect::PostgreSQL, PropertyType::Blob) => "BYTEA".to_string(),
            (_, other) => other.as_str().to_string(),
        }
    }

    /// Trailing LIMIT/OFFSET clause, empty when neither is set
    pub fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (self, limit, offset) {
            (_, None, None) => String::new(),
            (_, Some(limit), None) => format!(" LIMIT {}", limit),
            (_, Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
            (SqlDialect::PostgreSQL, None, Some(offset)) => format!(" OFFSET {}", offset),
            (SqlDialect::SQLite, None, Some(offset)) => format!(" LIMIT -1 OFFSET {}", offset),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(SqlDialect::PostgreSQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(DaoError::Configuration(format!("Unsupported database dialect: {}", s))),
        }
    }
}
