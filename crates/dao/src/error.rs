//! Error types for the DAO engine
//!
//! Shape and validation errors are raised before any statement runs; everything the
//! execution layer reports surfaces as [`DaoError::ExecutionFailed`].

use crate::descriptor::PropertyType;

/// Result type alias for DAO operations
pub type DaoResult<T> = Result<T, DaoError>;

/// Error kinds raised by DAO construction and operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum DaoError {
    /// Malformed id, select, expand, filter or descriptor shape
    #[error("Illegal argument: {0}")]
    InvalidArgument(String),

    /// A mandatory property has no value
    #[error("Illegal {property} attribute value in {table} entity: value is missing")]
    ValidationFailed { table: String, property: String },

    /// A property marked unique already holds the value
    #[error("Unique constraint violation for {property}[{value}]")]
    UniqueConstraintViolation { property: String, value: String },

    /// Expansion named an association the descriptor does not declare
    #[error("Unknown association for {table} DAO: {name}")]
    UnknownAssociation { table: String, name: String },

    /// Target or join DAO factory, or join capability, is absent or unusable
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(String),

    /// A value cannot be converted to the declared property type
    #[error("Invalid value for {property_type} property: {value}")]
    CoercionFailed {
        property_type: PropertyType,
        value: String,
    },

    /// Opaque failure reported by the execution layer
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Datasource or definition configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Definition or entity decoding error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DaoError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DaoError::InvalidArgument(msg.into())
    }

    pub(crate) fn missing_collaborator(msg: impl Into<String>) -> Self {
        DaoError::MissingCollaborator(msg.into())
    }

    /// True for errors raised before anything was sent to the backend
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            DaoError::InvalidArgument(_)
                | DaoError::ValidationFailed { .. }
                | DaoError::CoercionFailed { .. }
                | DaoError::UnknownAssociation { .. }
        )
    }
}

impl From<sqlx::Error> for DaoError {
    fn from(err: sqlx::Error) -> Self {
        DaoError::ExecutionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DaoError {
    fn from(err: serde_json::Error) -> Self {
        DaoError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DaoError {
    fn from(err: serde_yaml::Error) -> Self {
        DaoError::Serialization(err.to_string())
    }
}
