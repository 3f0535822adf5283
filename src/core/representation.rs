//! Hyperlinked JSON form of a stored record

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::core::coercion;
use crate::core::error::RestError;
use crate::core::field::FieldValue;
use crate::core::schema::Schema;
use crate::core::store::{Record, RecordStore};
use crate::core::uri::UriBuilder;

/// `{href, key, class, properties}` as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Representation {
    pub href: String,
    pub key: Value,
    pub class: String,
    /// Every declared field in declaration order, then every relationship URI
    pub properties: IndexMap<String, Value>,
}

/// Encodes records, resolving references through the store
pub struct RepresentationEncoder<'a> {
    store: &'a dyn RecordStore,
    uris: &'a UriBuilder,
}

impl<'a> RepresentationEncoder<'a> {
    pub fn new(store: &'a dyn RecordStore, uris: &'a UriBuilder) -> Self {
        Self { store, uris }
    }

    pub async fn encode(&self, schema: &Schema, record: &Record) -> Result<Representation, RestError> {
        let mut properties = IndexMap::new();

        for name in schema.fields().keys() {
            let encoded = match record.value(name) {
                FieldValue::Reference(target) => {
                    if self.store.get(target).await?.is_some() {
                        self.uris.item(&target.kind, &target.key).into()
                    } else {
                        tracing::debug!(
                            resource = schema.name(),
                            field = %name,
                            target = %target.key,
                            "reference target is gone"
                        );
                        Value::Null
                    }
                }
                value => coercion::encode(value, self.uris),
            };
            properties.insert(name.clone(), encoded);
        }

        for name in schema.relationships().keys() {
            properties.insert(
                name.clone(),
                self.uris
                    .relationship(schema.name(), &record.key, name)
                    .into(),
            );
        }

        Ok(Representation {
            href: self.uris.item(schema.name(), &record.key),
            key: record.key.to_json(),
            class: schema.name().to_string(),
            properties,
        })
    }

    pub async fn encode_all(
        &self,
        schema: &Schema,
        records: &[Record],
    ) -> Result<Vec<Representation>, RestError> {
        let mut encoded = Vec::with_capacity(records.len());
        for record in records {
            encoded.push(self.encode(schema, record).await?);
        }
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::{KeyRef, RecordKey};
    use crate::core::schema::{FieldDescriptor, ReverseRelationship};
    use crate::storage::InMemoryRecordStore;
    use serde_json::json;

    fn person() -> Schema {
        let mut schema = Schema::new("Person")
            .field("name", FieldDescriptor::string())
            .field("boss", FieldDescriptor::reference("Person"));
        schema.add_relationship(ReverseRelationship {
            name: "pets".into(),
            source: "Pet".into(),
            field: "owner".into(),
        });
        schema
    }

    #[tokio::test]
    async fn test_encode_links_references_and_relationships() {
        let store = InMemoryRecordStore::new();
        let uris = UriBuilder::new("http://api.test", "");
        let boss = Record::new("Person", RecordKey::Id(1))
            .with_value("name", FieldValue::String("Grace".into()));
        store.put(boss.clone()).await.unwrap();

        let ada = Record::new("Person", RecordKey::Name("ada".into()))
            .with_value("name", FieldValue::String("Ada".into()))
            .with_value("boss", FieldValue::Reference(boss.key_ref()));

        let encoder = RepresentationEncoder::new(&store, &uris);
        let repr = encoder.encode(&person(), &ada).await.unwrap();

        assert_eq!(repr.href, "http://api.test/Person/ada");
        assert_eq!(repr.key, json!("ada"));
        assert_eq!(repr.class, "Person");
        assert_eq!(
            serde_json::to_value(&repr.properties).unwrap(),
            json!({
                "name": "Ada",
                "boss": "http://api.test/Person/1",
                "pets": "http://api.test/Person/ada/pets/"
            })
        );
        let order: Vec<&str> = repr.properties.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["name", "boss", "pets"]);
    }

    #[tokio::test]
    async fn test_dangling_reference_encodes_as_null() {
        let store = InMemoryRecordStore::new();
        let uris = UriBuilder::new("http://api.test", "");
        let record = Record::new("Person", RecordKey::Id(2)).with_value(
            "boss",
            FieldValue::Reference(KeyRef::new("Person", RecordKey::Id(99))),
        );

        let repr = RepresentationEncoder::new(&store, &uris)
            .encode(&person(), &record)
            .await
            .unwrap();
        assert_eq!(repr.properties["boss"], Value::Null);
        assert_eq!(repr.properties["name"], Value::Null);
    }
}
