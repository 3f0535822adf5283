//! # hyperrest
//!
//! A schema-driven REST engine. Declare record types once and get a full
//! hyperlinked JSON API for them: collection listing with filters, sorting
//! and pagination, item fetch/replace/delete, and nested collections for
//! reverse relationships.
//!
//! ## Features
//!
//! - **Declarative Schemas**: Fields, kinds and relationships in code or YAML
//! - **Safe Coercion**: Untrusted JSON is checked per field, all errors at once
//! - **Query Strings**: `filter=age >= 30`, `sort=name`, `limit`, `offset`
//! - **Hyperlinks**: Every record carries its URI and its relationship URIs
//! - **Pluggable**: Record store, authorizer and principal resolver are traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hyperrest::prelude::*;
//!
//! let person = Schema::new("Person")
//!     .field("name", FieldDescriptor::string().required())
//!     .field("age", FieldDescriptor::integer());
//! let pet = Schema::new("Pet")
//!     .field("name", FieldDescriptor::string())
//!     .field("owner", FieldDescriptor::reference("Person").with_collection("pets"));
//!
//! ServerBuilder::new()
//!     .with_store(InMemoryRecordStore::new())
//!     .with_authorizer(AllowAll)
//!     .register_schemas([person, pet])
//!     .serve("127.0.0.1:3000")
//!     .await?;
//!
//! // GET /Person/1/pets/ lists every Pet whose owner is Person 1
//! ```

pub mod config;
pub mod core;
pub mod resources;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{
            AllowAll, AnonymousResolver, AuthPolicy, AuthTarget, Authorizer,
            HeaderPrincipalResolver, PolicyAuthorizer, Principal, PrincipalResolver, Verb,
            VerbPolicies,
        },
        error::{ConfigError, QueryError, RequestError, ResourceError, RestError, ValidationReport},
        field::{FieldKind, FieldValue, KeyRef, RecordKey},
        query::{Filter, Operator, Order, Query, QueryParams},
        representation::Representation,
        schema::{FieldDescriptor, Schema},
        store::{Record, RecordStore},
        uri::UriBuilder,
    };

    // === Resources ===
    pub use crate::resources::{RequestContext, ResourceOperations, SchemaRegistry};

    // === Storage ===
    pub use crate::storage::InMemoryRecordStore;

    // === Config ===
    pub use crate::config::{ApiConfig, KeyPolicy, ServerConfig};

    // === Server ===
    pub use crate::server::{RestExposure, ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};

    // === Axum ===
    pub use axum::Router;
}
