//! Configuration - datasource settings and declarative ORM definitions
//!
//! Datasources load from JSON, YAML or the environment (`DATABASE_URL`,
//! `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS`, `DATASOURCE_NAME`).
//! ORM definitions load from JSON or YAML and become validated descriptors.

use std::env;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::{Association, AssociationType, DaoFactory, OrmDescriptor, Property};
use crate::error::{DaoError, DaoResult};
use crate::statements::SqlDialect;

/// Name used when a datasource configuration does not give one
pub const DEFAULT_DATASOURCE_NAME: &str = "DefaultDB";

/// Datasource connection and pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasourceConfig {
    pub name: String,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATASOURCE_NAME.to_string(),
            url: "sqlite::memory:".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600), // 10 minutes
            max_lifetime_seconds: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl DatasourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn from_json(json: &str) -> DaoResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> DaoResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> DaoResult<Self> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| DaoError::Configuration("DATABASE_URL is not set".to_string()))?;
        let defaults = Self::default();

        let config = Self {
            name: env::var("DATASOURCE_NAME").unwrap_or(defaults.name),
            url,
            max_connections: env_number("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_number("DATABASE_MIN_CONNECTIONS", defaults.min_connections)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DaoResult<()> {
        if self.name.trim().is_empty() {
            return Err(DaoError::Configuration("Datasource name must not be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(DaoError::Configuration(
                "Maximum connections must be greater than 0".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(DaoError::Configuration(format!(
                "Minimum connections ({}) exceed maximum connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        self.dialect().map(|_| ())
    }

    /// Dialect implied by the URL scheme
    pub fn dialect(&self) -> DaoResult<SqlDialect> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| DaoError::Configuration(format!("Invalid database URL: {}", e)))?;
        parsed.scheme().parse()
    }

    /// In-memory SQLite databases live only as long as their connection
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite:") && (self.url.contains(":memory:") || self.url.contains("mode=memory"))
    }
}

fn env_number(key: &str, default: u32) -> DaoResult<u32> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<u32>().map_err(|_| {
            DaoError::Configuration(format!("{} must be a non-negative number but was '{}'", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Declarative association: factories are supplied by name when the definition
/// becomes a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub association_type: AssociationType,
    pub join_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub defaults: Map<String, Value>,
    /// Name of the target DAO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Name of the join DAO (many-to-many)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default)]
    pub targets_owner: bool,
}

/// Declarative ORM mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrmDefinition {
    pub table: String,
    pub properties: Vec<Property>,
    #[serde(default)]
    pub associations: Vec<AssociationDefinition>,
}

impl OrmDefinition {
    pub fn from_json(json: &str) -> DaoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> DaoResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Build the descriptor for a definition without named collaborators
    pub fn into_descriptor(self) -> DaoResult<OrmDescriptor> {
        self.into_descriptor_with(|_| None)
    }

    /// Build the descriptor, resolving target and join DAO names through `resolve`
    pub fn into_descriptor_with<F>(self, resolve: F) -> DaoResult<OrmDescriptor>
    where
        F: Fn(&str) -> Option<DaoFactory>,
    {
        let mut associations = Vec::with_capacity(self.associations.len());
        for definition in self.associations {
            let mut association = Association::new(definition.name, definition.association_type, definition.join_key)
                .defaults(definition.defaults);
            association.key = definition.key;
            association.self_referencing = definition.targets_owner;
            if let Some(target) = definition.target.as_deref() {
                association.target_dao = Some(resolve(target).ok_or_else(|| {
                    DaoError::missing_collaborator(format!(
                        "No DAO named {} for association {}",
                        target, association.name
                    ))
                })?);
            }
            if let Some(join) = definition.join.as_deref() {
                association.join_dao = Some(resolve(join).ok_or_else(|| {
                    DaoError::missing_collaborator(format!(
                        "No DAO named {} for association {}",
                        join, association.name
                    ))
                })?);
            }
            associations.push(association);
        }
        OrmDescriptor::new(self.table, self.properties, associations)
    }
}
