//! Schema descriptors: declared fields plus derived reverse relationships

use indexmap::IndexMap;

use crate::core::field::{FieldKind, MAX_STRING_LENGTH};

/// Declared field of a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    /// A required field may not be absent on create nor null on any write
    pub required: bool,
    /// For references: name of the reverse relationship on the target
    pub collection: Option<String>,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            collection: None,
        }
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::string())
    }

    /// Short string with a tighter bound; never above the default bound
    pub fn string_with_max(max_length: usize) -> Self {
        Self::new(FieldKind::String {
            max_length: max_length.min(MAX_STRING_LENGTH),
        })
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn blob() -> Self {
        Self::new(FieldKind::Blob)
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    pub fn time() -> Self {
        Self::new(FieldKind::Time)
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime)
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Self::new(FieldKind::reference(target))
    }

    /// Expose the records pointing here as `collection` on the target
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Target schema when this is a reference field
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Reference { target } => Some(target),
            _ => None,
        }
    }
}

/// Read-only relationship derived from a reference field on another schema
///
/// The records of `source` whose `field` points at an owner form the
/// owner's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseRelationship {
    pub name: String,
    pub source: String,
    pub field: String,
}

/// A record type: name plus ordered field descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    fields: IndexMap<String, FieldDescriptor>,
    relationships: IndexMap<String, ReverseRelationship>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            relationships: IndexMap::new(),
        }
    }

    /// Declare a field; fields keep declaration order
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn relationships(&self) -> &IndexMap<String, ReverseRelationship> {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&ReverseRelationship> {
        self.relationships.get(name)
    }

    /// True when `name` is taken by a field or a relationship
    pub fn has_member(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.relationships.contains_key(name)
    }

    pub(crate) fn add_relationship(&mut self, relationship: ReverseRelationship) {
        self.relationships
            .insert(relationship.name.clone(), relationship);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_keep_declaration_order() {
        let schema = Schema::new("Person")
            .field("name", FieldDescriptor::string().required())
            .field("age", FieldDescriptor::integer())
            .field("born", FieldDescriptor::date());

        let names: Vec<&str> = schema.fields().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["name", "age", "born"]);
        assert!(schema.get_field("name").unwrap().required);
        assert!(!schema.get_field("age").unwrap().required);
    }

    #[test]
    fn test_string_max_is_capped() {
        assert_eq!(
            FieldDescriptor::string_with_max(10_000).kind,
            FieldKind::String {
                max_length: MAX_STRING_LENGTH
            }
        );
        assert_eq!(
            FieldDescriptor::string_with_max(40).kind,
            FieldKind::String { max_length: 40 }
        );
    }

    #[test]
    fn test_reference_target_and_collection() {
        let field = FieldDescriptor::reference("Person").with_collection("pets");
        assert_eq!(field.target(), Some("Person"));
        assert_eq!(field.collection.as_deref(), Some("pets"));
        assert_eq!(FieldDescriptor::integer().target(), None);
    }

    #[test]
    fn test_has_member_covers_relationships() {
        let mut schema = Schema::new("Person").field("name", FieldDescriptor::string());
        schema.add_relationship(ReverseRelationship {
            name: "pets".into(),
            source: "Pet".into(),
            field: "owner".into(),
        });

        assert!(schema.has_member("name"));
        assert!(schema.has_member("pets"));
        assert!(!schema.has_member("age"));
        assert_eq!(schema.relationship("pets").unwrap().source, "Pet");
    }
}
