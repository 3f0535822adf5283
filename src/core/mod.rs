//! Core module containing the schema model, coercion, queries and errors

pub mod auth;
pub mod coercion;
pub mod error;
pub mod field;
pub mod query;
pub mod representation;
pub mod schema;
pub mod store;
pub mod uri;

pub use auth::{
    AllowAll, AnonymousResolver, AuthPolicy, AuthTarget, Authorizer, HeaderPrincipalResolver,
    PolicyAuthorizer, Principal, PrincipalResolver, Verb, VerbPolicies,
};
pub use error::{
    ConfigError, QueryError, RequestError, ResourceError, RestError, ValidationReport,
};
pub use field::{FieldKind, FieldValue, KeyRef, RecordKey};
pub use query::{Filter, Operator, Order, Page, Query, QueryBuilder, QueryParams};
pub use representation::{Representation, RepresentationEncoder};
pub use schema::{FieldDescriptor, ReverseRelationship, Schema};
pub use store::{Record, RecordStore};
pub use uri::{ResourcePath, UriBuilder};
