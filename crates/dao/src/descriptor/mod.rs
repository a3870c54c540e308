//! ORM Descriptor - validated, immutable entity mapping
//!
//! A descriptor maps an entity to its table, columns and associations. It is built once,
//! validated, and shared by the DAO and its statement builder for the DAO's lifetime.

pub mod association;
pub mod property;

use std::collections::{HashMap, HashSet};

pub use association::{Association, AssociationType, DaoFactory};
pub use property::{DbValueTransform, Operation, Property, PropertyType, ValueTransform};

use crate::error::{DaoError, DaoResult};
use crate::security::validate_identifier;

/// Parsed and validated ORM mapping
#[derive(Debug, Clone)]
pub struct OrmDescriptor {
    table: String,
    properties: Vec<Property>,
    index: HashMap<String, usize>,
    primary_key: usize,
    associations: Vec<Association>,
}

impl OrmDescriptor {
    pub fn builder(table: impl Into<String>) -> OrmDescriptorBuilder {
        OrmDescriptorBuilder {
            table: table.into(),
            properties: Vec::new(),
            associations: Vec::new(),
        }
    }

    /// Validate and assemble a descriptor
    pub fn new(
        table: impl Into<String>,
        properties: Vec<Property>,
        associations: Vec<Association>,
    ) -> DaoResult<Self> {
        let table = table.into();
        validate_identifier("table", &table)?;

        if properties.is_empty() {
            return Err(DaoError::invalid(format!("ORM for table {} declares no properties", table)));
        }

        let mut index = HashMap::with_capacity(properties.len());
        let mut columns = HashSet::with_capacity(properties.len());
        for (position, property) in properties.iter().enumerate() {
            if property.name.trim().is_empty() {
                return Err(DaoError::invalid(format!("ORM for table {} has a property without a name", table)));
            }
            validate_identifier("column", &property.column)?;
            if index.insert(property.name.clone(), position).is_some() {
                return Err(DaoError::invalid(format!(
                    "ORM for table {} declares property '{}' twice",
                    table, property.name
                )));
            }
            if !columns.insert(property.column.to_uppercase()) {
                return Err(DaoError::invalid(format!(
                    "ORM for table {} maps column '{}' twice",
                    table, property.column
                )));
            }
            if property.size == Some(0) {
                return Err(DaoError::invalid(format!(
                    "ORM for table {} declares zero size for property '{}'",
                    table, property.name
                )));
            }
        }

        let mut ids = properties.iter().enumerate().filter(|(_, p)| p.id);
        let primary_key = match (ids.next(), ids.next()) {
            (Some((position, _)), None) => position,
            (None, _) => {
                return Err(DaoError::invalid(format!("ORM for table {} declares no primary key", table)))
            }
            (Some(_), Some(_)) => {
                return Err(DaoError::invalid(format!(
                    "ORM for table {} declares more than one primary key",
                    table
                )))
            }
        };

        let mut descriptor = Self {
            table,
            properties,
            index,
            primary_key,
            associations: Vec::with_capacity(associations.len()),
        };
        descriptor.properties[primary_key].required = true;

        for association in associations {
            descriptor.validate_association(&association)?;
            descriptor.associations.push(association);
        }

        Ok(descriptor)
    }

    fn validate_association(&self, association: &Association) -> DaoResult<()> {
        let name = &association.name;
        if name.trim().is_empty() {
            return Err(DaoError::invalid(format!("ORM for table {} has an association without a name", self.table)));
        }
        if self.index.contains_key(name) || self.association(name).is_some() {
            return Err(DaoError::invalid(format!(
                "ORM for table {} declares association '{}' that clashes with another property or association",
                self.table, name
            )));
        }
        if association.join_key.trim().is_empty() {
            return Err(DaoError::invalid(format!("Association {} declares no joinKey", name)));
        }
        if let Some(owner_key) = association.owner_key() {
            if self.property(owner_key).is_none() {
                return Err(DaoError::invalid(format!(
                    "Association {} references unknown {} property '{}'",
                    name, self.table, owner_key
                )));
            }
        }
        if !association.has_target() {
            return Err(DaoError::missing_collaborator(format!(
                "Association {} declares no target DAO",
                name
            )));
        }
        if association.association_type == AssociationType::ManyToMany && !association.has_join() {
            return Err(DaoError::missing_collaborator(format!(
                "Association {} is MANY-TO-MANY but declares no join DAO",
                name
            )));
        }
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Properties in declaration order
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.index.get(name).map(|&position| &self.properties[position])
    }

    pub fn primary_key(&self) -> &Property {
        &self.properties[self.primary_key]
    }

    pub fn mandatory_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_mandatory())
    }

    pub fn optional_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !p.is_mandatory())
    }

    pub fn unique_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.unique)
    }

    /// Associations in declaration order
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn association_names(&self) -> impl Iterator<Item = &str> {
        self.associations.iter().map(|a| a.name.as_str())
    }

    /// PostgreSQL folds unquoted identifiers to lower case
    pub(crate) fn lowercase_columns(&mut self) {
        for property in &mut self.properties {
            property.column = property.column.to_lowercase();
        }
    }
}

/// Fluent builder for [`OrmDescriptor`]
pub struct OrmDescriptorBuilder {
    table: String,
    properties: Vec<Property>,
    associations: Vec<Association>,
}

impl OrmDescriptorBuilder {
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn properties(mut self, properties: impl IntoIterator<Item = Property>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn build(self) -> DaoResult<OrmDescriptor> {
        OrmDescriptor::new(self.table, self.properties, self.associations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students() -> OrmDescriptorBuilder {
        OrmDescriptor::builder("STUDENTS")
            .property(Property::new("id", "ID", PropertyType::Integer).primary_key())
            .property(Property::new("name", "NAME", PropertyType::Varchar).size(20).required().unique())
            .property(Property::new("active", "ACTIVE", PropertyType::Boolean).required())
            .property(Property::new("note", "NOTE", PropertyType::Varchar))
    }

    #[test]
    fn test_lookup_and_partitions() {
        let orm = students().build().unwrap();

        assert_eq!(orm.table(), "STUDENTS");
        assert_eq!(orm.primary_key().name, "id");
        assert_eq!(orm.property("name").unwrap().column, "NAME");
        assert!(orm.property("missing").is_none());

        let mandatory: Vec<_> = orm.mandatory_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(mandatory, vec!["id", "name", "active"]);
        let optional: Vec<_> = orm.optional_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(optional, vec!["note"]);
        let unique: Vec<_> = orm.unique_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(unique, vec!["name"]);
    }

    #[test]
    fn test_primary_key_count() {
        let none = OrmDescriptor::builder("T")
            .property(Property::new("name", "NAME", PropertyType::Varchar))
            .build();
        assert!(matches!(none, Err(DaoError::InvalidArgument(_))));

        let two = students()
            .property(Property::new("code", "CODE", PropertyType::Integer).primary_key())
            .build();
        assert!(matches!(two, Err(DaoError::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicates_rejected() {
        let dup_name = students().property(Property::new("name", "OTHER", PropertyType::Varchar)).build();
        assert!(dup_name.is_err());

        let dup_column = students().property(Property::new("other", "name", PropertyType::Varchar)).build();
        assert!(dup_column.is_err());
    }

    #[test]
    fn test_unsafe_identifiers_rejected() {
        assert!(OrmDescriptor::builder("T; DROP TABLE X")
            .property(Property::new("id", "ID", PropertyType::Integer).primary_key())
            .build()
            .is_err());
        assert!(students()
            .property(Property::new("bad", "BAD COLUMN", PropertyType::Varchar))
            .build()
            .is_err());
    }

    #[test]
    fn test_association_references_are_validated() {
        let unknown_key = students()
            .association(Association::many_to_one("school", "schoolId").targets_owner())
            .build();
        assert!(matches!(unknown_key, Err(DaoError::InvalidArgument(_))));

        let no_target = students()
            .association(Association::one_to_many("courses", "studentId"))
            .build();
        assert!(matches!(no_target, Err(DaoError::MissingCollaborator(_))));

        let no_join = students()
            .association(Association::many_to_many("teachers", "studentId").targets_owner())
            .build();
        assert!(matches!(no_join, Err(DaoError::MissingCollaborator(_))));

        let clash = students()
            .association(Association::one_to_many("name", "studentId").targets_owner())
            .build();
        assert!(clash.is_err());
    }

    #[test]
    fn test_associations_keep_declaration_order() {
        let orm = students()
            .property(Property::new("mentorId", "MENTOR_ID", PropertyType::Integer))
            .association(Association::one_to_many("peers", "mentorId").targets_owner())
            .association(Association::many_to_one("mentor", "mentorId").targets_owner())
            .build()
            .unwrap();

        let names: Vec<_> = orm.association_names().collect();
        assert_eq!(names, vec!["peers", "mentor"]);
        assert_eq!(
            orm.association("mentor").unwrap().association_type,
            AssociationType::ManyToOne
        );
    }

    #[test]
    fn test_lowercase_columns() {
        let mut orm = students().build().unwrap();
        orm.lowercase_columns();
        assert_eq!(orm.property("name").unwrap().column, "name");
        assert_eq!(orm.primary_key().column, "id");
    }
}
