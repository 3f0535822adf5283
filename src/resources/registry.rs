//! Schema registry
//!
//! Resolves resource names to schemas and wires reverse relationships:
//! every reference field declared with a collection name adds a read-only
//! relationship to the schema it points at. The registry is built once and
//! never changes afterwards.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

use crate::core::error::{ConfigError, ResourceError, RestError};
use crate::core::query::KEY_FIELD;
use crate::core::schema::{ReverseRelationship, Schema};

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

fn check_identifier(name: &str) -> Result<(), ConfigError> {
    if identifier_regex().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "must start with a letter or '_' and contain only letters, digits and '_'"
                .to_string(),
        })
    }
}

fn check_member_name(name: &str) -> Result<(), ConfigError> {
    check_identifier(name)?;
    if name == KEY_FIELD {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "'key' is reserved for the record key".to_string(),
        });
    }
    Ok(())
}

/// Registry of every schema the API serves
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Schema>,
}

impl SchemaRegistry {
    /// Index schemas by name, then derive reverse relationships
    pub fn new(schemas: impl IntoIterator<Item = Schema>) -> Result<Self, ConfigError> {
        let mut indexed: IndexMap<String, Schema> = IndexMap::new();

        for schema in schemas {
            check_identifier(schema.name())?;
            for name in schema.fields().keys() {
                check_member_name(name)?;
            }
            if indexed.contains_key(schema.name()) {
                return Err(ConfigError::DuplicateResource(schema.name().to_string()));
            }
            indexed.insert(schema.name().to_string(), schema);
        }

        let mut relationships = Vec::new();
        for schema in indexed.values() {
            for (field, descriptor) in schema.fields() {
                let Some(target) = descriptor.target() else {
                    continue;
                };
                if !indexed.contains_key(target) {
                    return Err(ConfigError::UnknownTarget {
                        resource: schema.name().to_string(),
                        field: field.clone(),
                        target: target.to_string(),
                    });
                }
                if let Some(collection) = &descriptor.collection {
                    check_member_name(collection)?;
                    relationships.push((
                        target.to_string(),
                        ReverseRelationship {
                            name: collection.clone(),
                            source: schema.name().to_string(),
                            field: field.clone(),
                        },
                    ));
                }
            }
        }

        for (target, relationship) in relationships {
            let Some(owner) = indexed.get_mut(&target) else {
                continue;
            };
            if owner.has_member(&relationship.name) {
                return Err(ConfigError::CollectionConflict {
                    target,
                    collection: relationship.name,
                });
            }
            tracing::debug!(
                resource = %target,
                relationship = %relationship.name,
                source = %relationship.source,
                field = %relationship.field,
                "registered reverse relationship"
            );
            owner.add_relationship(relationship);
        }

        Ok(Self { schemas: indexed })
    }

    /// Schema for `name`, or `UnknownResource`
    pub fn resolve(&self, name: &str) -> Result<&Schema, RestError> {
        self.schemas.get(name).ok_or_else(|| {
            ResourceError::UnknownResource {
                resource: name.to_string(),
            }
            .into()
        })
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Resource names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldDescriptor;

    fn person() -> Schema {
        Schema::new("Person")
            .field("name", FieldDescriptor::string())
            .field("boss", FieldDescriptor::reference("Person").with_collection("reports"))
    }

    fn pet() -> Schema {
        Schema::new("Pet")
            .field("name", FieldDescriptor::string())
            .field("owner", FieldDescriptor::reference("Person").with_collection("pets"))
            .field("vet", FieldDescriptor::reference("Person"))
    }

    #[test]
    fn test_reverse_relationships_land_on_target() {
        let registry = SchemaRegistry::new(vec![person(), pet()]).unwrap();

        let person = registry.resolve("Person").unwrap();
        let names: Vec<&str> = person.relationships().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["reports", "pets"]);

        let pets = person.relationship("pets").unwrap();
        assert_eq!(pets.source, "Pet");
        assert_eq!(pets.field, "owner");

        assert!(registry.resolve("Pet").unwrap().relationships().is_empty());
    }

    #[test]
    fn test_names_keep_registration_order() {
        let registry = SchemaRegistry::new(vec![pet(), person()]).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Pet", "Person"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_resource() {
        let registry = SchemaRegistry::new(vec![person()]).unwrap();
        let err = registry.resolve("Robot").unwrap_err();
        assert!(matches!(
            err,
            RestError::Resource(ResourceError::UnknownResource { ref resource }) if resource == "Robot"
        ));
    }

    #[test]
    fn test_duplicate_resource() {
        let err = SchemaRegistry::new(vec![person(), person()]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateResource(name) if name == "Person"));
    }

    #[test]
    fn test_unknown_target() {
        let err = SchemaRegistry::new(vec![pet()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTarget { target, .. } if target == "Person"));
    }

    #[test]
    fn test_collection_conflicts_with_field() {
        let clash = Schema::new("Pet")
            .field("owner", FieldDescriptor::reference("Person").with_collection("name"));
        let err = SchemaRegistry::new(vec![person(), clash]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CollectionConflict { collection, .. } if collection == "name"
        ));
    }

    #[test]
    fn test_invalid_names() {
        let bad = Schema::new("Bad-Name");
        assert!(matches!(
            SchemaRegistry::new(vec![bad]),
            Err(ConfigError::InvalidName { .. })
        ));

        let reserved = Schema::new("Thing").field("key", FieldDescriptor::string());
        assert!(matches!(
            SchemaRegistry::new(vec![reserved]),
            Err(ConfigError::InvalidName { name, .. }) if name == "key"
        ));
    }
}
