//! Resource operations: the CRUD pipelines behind every route
//!
//! Each operation resolves the schema, consults the authorizer before it
//! mutates or encodes anything, talks to the store and encodes the result.
//! Operations are independent of HTTP; the handlers only translate.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::{KeyPolicy, ServerConfig};
use crate::core::auth::{AuthTarget, Authorizer, Principal, Verb};
use crate::core::coercion::{Submission, decode_submission};
use crate::core::error::{RequestError, ResourceError, RestError, ValidationReport};
use crate::core::field::{FieldValue, KeyRef, RecordKey};
use crate::core::query::{Filter, Operator, Query, QueryBuilder, QueryParams, KEY_FIELD};
use crate::core::representation::{Representation, RepresentationEncoder};
use crate::core::schema::Schema;
use crate::core::store::{Record, RecordStore};
use crate::core::uri::UriBuilder;
use crate::resources::registry::SchemaRegistry;

/// Per-request inputs: who is asking and how to spell URIs
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
    pub uris: UriBuilder,
}

impl RequestContext {
    pub fn new(principal: Principal, uris: UriBuilder) -> Self {
        Self { principal, uris }
    }
}

/// Body of `GET /`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteIndex {
    /// Resource name to collection URI, in registration order
    pub resources: IndexMap<String, String>,
}

/// Body of every collection response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub results: Vec<Representation>,
}

/// Records of `source` whose reference field points at an owner
struct RelatedSet<'a> {
    schema: &'a Schema,
    base: Query,
}

/// The operation set shared by all requests
pub struct ResourceOperations {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn RecordStore>,
    authorizer: Arc<dyn Authorizer>,
    settings: Arc<ServerConfig>,
}

impl ResourceOperations {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn Authorizer>,
        settings: Arc<ServerConfig>,
    ) -> Self {
        Self {
            registry,
            store,
            authorizer,
            settings,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ServerConfig {
        &self.settings
    }

    /// Every resource name mapped to its collection URI
    pub async fn site_index(&self, ctx: &RequestContext) -> Result<SiteIndex, RestError> {
        self.authorize(ctx, Verb::Get, &AuthTarget::Site)?;

        let resources = self
            .registry
            .names()
            .map(|name| (name.to_string(), ctx.uris.collection(name)))
            .collect();
        Ok(SiteIndex { resources })
    }

    /// One page of a collection
    pub async fn list(
        &self,
        ctx: &RequestContext,
        resource: &str,
        params: &QueryParams,
    ) -> Result<Vec<Representation>, RestError> {
        let schema = self.registry.resolve(resource)?;
        let query = QueryBuilder::new(&ctx.uris).build(schema, Query::all(schema.name()), params)?;
        self.list_query(ctx, schema, &query, params).await
    }

    /// A single record
    pub async fn fetch(
        &self,
        ctx: &RequestContext,
        resource: &str,
        key: &str,
    ) -> Result<Representation, RestError> {
        let schema = self.registry.resolve(resource)?;
        let record = self.lookup(schema, key).await?;
        self.authorize(
            ctx,
            Verb::Get,
            &AuthTarget::Record {
                kind: schema.name(),
                record: record.as_ref(),
            },
        )?;
        let record = record.ok_or_else(|| RestError::not_found(schema.name(), key))?;

        tracing::debug!(resource = schema.name(), key = %record.key, "fetched record");
        self.encoder(ctx).encode(schema, &record).await
    }

    /// Create a record from a JSON object; returns the new record's URI
    ///
    /// Under the literal key policy a supplied key that already names a
    /// record overwrites it, with unsubmitted fields cleared. That overwrite
    /// also needs `put` on the existing record.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        resource: &str,
        body: Value,
    ) -> Result<String, RestError> {
        let schema = self.registry.resolve(resource)?;
        let mut body = into_object(body)?;
        let supplied_key = body.remove(KEY_FIELD);

        self.authorize(ctx, Verb::Post, &AuthTarget::Schema(schema))?;

        let mut report = ValidationReport::new();
        let values = decode_submission(schema, &body, Submission::Create, &ctx.uris, &mut report);

        let literal_key = match (self.settings.key_policy, supplied_key) {
            (_, None) | (_, Some(Value::Null)) => None,
            (KeyPolicy::Literal, Some(wire)) => match RecordKey::from_json(&wire) {
                Ok(key) => Some(key),
                Err(message) => {
                    report.add(KEY_FIELD, message);
                    None
                }
            },
            (KeyPolicy::Generated, Some(_)) => {
                tracing::debug!(resource = schema.name(), "ignoring supplied key");
                None
            }
        };

        self.check_references(&values, &mut report).await?;
        report.into_result()?;

        let key = match literal_key {
            Some(key) => {
                let existing = self.store.get(&KeyRef::new(schema.name(), key.clone())).await?;
                if let Some(existing) = &existing {
                    self.authorize(
                        ctx,
                        Verb::Put,
                        &AuthTarget::Record {
                            kind: schema.name(),
                            record: Some(existing),
                        },
                    )?;
                }
                key
            }
            None => self.store.allocate_key(schema.name()).await?,
        };
        let record = Record {
            kind: schema.name().to_string(),
            key,
            values,
        };
        self.store.put(record.clone()).await?;

        tracing::info!(resource = schema.name(), key = %record.key, "created record");
        Ok(ctx.uris.item(schema.name(), &record.key))
    }

    /// Overlay the submitted fields onto an existing record; returns its URI
    pub async fn replace(
        &self,
        ctx: &RequestContext,
        resource: &str,
        key: &str,
        body: Value,
    ) -> Result<String, RestError> {
        let schema = self.registry.resolve(resource)?;
        let mut record = self
            .lookup(schema, key)
            .await?
            .ok_or_else(|| RestError::not_found(schema.name(), key))?;

        self.authorize(
            ctx,
            Verb::Put,
            &AuthTarget::Record {
                kind: schema.name(),
                record: Some(&record),
            },
        )?;

        let mut body = into_object(body)?;
        let mut report = ValidationReport::new();
        if let Some(wire) = body.remove(KEY_FIELD) {
            if RecordKey::from_json(&wire).ok().as_ref() != Some(&record.key) {
                report.add(KEY_FIELD, "is immutable");
            }
        }

        let values = decode_submission(schema, &body, Submission::Replace, &ctx.uris, &mut report);
        self.check_references(&values, &mut report).await?;
        report.into_result()?;

        let changed: Vec<String> = values.keys().cloned().collect();
        for (name, value) in values {
            record.set(name, value);
        }
        self.store.put(record.clone()).await?;

        tracing::info!(
            resource = schema.name(),
            key = %record.key,
            fields = ?changed,
            "replaced record"
        );
        Ok(ctx.uris.item(schema.name(), &record.key))
    }

    /// Delete a single record
    pub async fn delete_one(
        &self,
        ctx: &RequestContext,
        resource: &str,
        key: &str,
    ) -> Result<(), RestError> {
        let schema = self.registry.resolve(resource)?;
        let record = self.lookup(schema, key).await?;
        self.authorize(
            ctx,
            Verb::Delete,
            &AuthTarget::Record {
                kind: schema.name(),
                record: record.as_ref(),
            },
        )?;
        let record = record.ok_or_else(|| RestError::not_found(schema.name(), key))?;

        self.store.delete_multi(&[record.key_ref()]).await?;
        tracing::info!(resource = schema.name(), key = %record.key, "deleted record");
        Ok(())
    }

    /// Delete every record of a type matching the request's filters
    ///
    /// Returns the number of records deleted.
    pub async fn delete_all(
        &self,
        ctx: &RequestContext,
        resource: &str,
        params: &QueryParams,
    ) -> Result<usize, RestError> {
        let schema = self.registry.resolve(resource)?;
        let query = QueryBuilder::new(&ctx.uris).build(schema, Query::all(schema.name()), params)?;
        self.delete_query(ctx, schema, &query, params).await
    }

    /// One page of the records related to an owner
    pub async fn list_related(
        &self,
        ctx: &RequestContext,
        resource: &str,
        key: &str,
        relationship: &str,
        params: &QueryParams,
    ) -> Result<Vec<Representation>, RestError> {
        let related = self.relationship_query(ctx, resource, key, relationship).await?;
        let query = QueryBuilder::new(&ctx.uris).build(related.schema, related.base, params)?;
        self.list_query(ctx, related.schema, &query, params).await
    }

    /// Delete the records related to an owner; the owner itself survives
    pub async fn delete_related(
        &self,
        ctx: &RequestContext,
        resource: &str,
        key: &str,
        relationship: &str,
        params: &QueryParams,
    ) -> Result<usize, RestError> {
        let related = self.relationship_query(ctx, resource, key, relationship).await?;
        let query = QueryBuilder::new(&ctx.uris).build(related.schema, related.base, params)?;
        self.delete_query(ctx, related.schema, &query, params).await
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    async fn list_query(
        &self,
        ctx: &RequestContext,
        schema: &Schema,
        query: &Query,
        params: &QueryParams,
    ) -> Result<Vec<Representation>, RestError> {
        let page = params.page(self.settings.default_limit, self.settings.max_limit);
        let records = self.store.fetch(query, page.limit, page.offset).await?;

        self.authorize(
            ctx,
            Verb::Get,
            &AuthTarget::Records {
                kind: schema.name(),
                records: &records,
            },
        )?;

        tracing::debug!(
            resource = schema.name(),
            count = records.len(),
            limit = ?page.limit,
            offset = page.offset,
            "listed records"
        );
        self.encoder(ctx).encode_all(schema, &records).await
    }

    async fn delete_query(
        &self,
        ctx: &RequestContext,
        schema: &Schema,
        query: &Query,
        params: &QueryParams,
    ) -> Result<usize, RestError> {
        let page = params.explicit_page();
        let records = self.store.fetch(query, page.limit, page.offset).await?;

        self.authorize(
            ctx,
            Verb::Delete,
            &AuthTarget::Records {
                kind: schema.name(),
                records: &records,
            },
        )?;

        let keys: Vec<KeyRef> = records.iter().map(Record::key_ref).collect();
        self.store.delete_multi(&keys).await?;

        tracing::info!(resource = schema.name(), count = keys.len(), "deleted records");
        Ok(keys.len())
    }

    /// Resolve owner and relationship into the base query over the source
    async fn relationship_query(
        &self,
        ctx: &RequestContext,
        resource: &str,
        key: &str,
        relationship: &str,
    ) -> Result<RelatedSet<'_>, RestError> {
        let schema = self.registry.resolve(resource)?;
        let owner = self.lookup(schema, key).await?;
        self.authorize(
            ctx,
            Verb::Get,
            &AuthTarget::Record {
                kind: schema.name(),
                record: owner.as_ref(),
            },
        )?;
        let owner = owner.ok_or_else(|| RestError::not_found(schema.name(), key))?;

        let rel = schema.relationship(relationship).ok_or_else(|| {
            ResourceError::UnknownRelationship {
                resource: schema.name().to_string(),
                relationship: relationship.to_string(),
            }
        })?;
        let source = self.registry.resolve(&rel.source)?;

        Ok(RelatedSet {
            schema: source,
            base: Query::all(source.name()).filter(Filter::field(
                rel.field.as_str(),
                Operator::Eq,
                FieldValue::Reference(owner.key_ref()),
            )),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn encoder<'a>(&'a self, ctx: &'a RequestContext) -> RepresentationEncoder<'a> {
        RepresentationEncoder::new(self.store.as_ref(), &ctx.uris)
    }

    fn authorize(
        &self,
        ctx: &RequestContext,
        verb: Verb,
        target: &AuthTarget<'_>,
    ) -> Result<(), RestError> {
        if self.authorizer.authorize(&ctx.principal, verb, target) {
            return Ok(());
        }
        tracing::warn!(
            verb = %verb,
            resource = ?target.resource(),
            principal = ?ctx.principal,
            "authorization denied"
        );
        Err(RequestError::Forbidden {
            verb,
            resource: target.resource().map(String::from),
        }
        .into())
    }

    /// A key that cannot be parsed names no record
    async fn lookup(&self, schema: &Schema, key: &str) -> Result<Option<Record>, RestError> {
        let Ok(key) = RecordKey::parse(key) else {
            return Ok(None);
        };
        Ok(self.store.get(&KeyRef::new(schema.name(), key)).await?)
    }

    /// Every reference being written must point at an existing record
    async fn check_references(
        &self,
        values: &IndexMap<String, FieldValue>,
        report: &mut ValidationReport,
    ) -> Result<(), RestError> {
        for (name, value) in values {
            if let FieldValue::Reference(target) = value {
                if self.store.get(target).await?.is_none() {
                    report.add(
                        name.as_str(),
                        format!("{} '{}' does not exist", target.kind, target.key),
                    );
                }
            }
        }
        Ok(())
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, RestError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(RestError::bad_request("expected a JSON object")),
    }
}
