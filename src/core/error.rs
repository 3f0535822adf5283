//! Typed error handling for the resource engine
//!
//! Every failure a request can hit is a [`RestError`]. Each variant wraps a
//! more specific category so callers can match on exactly what went wrong:
//!
//! - [`ResourceError`]: unknown resource types, keys and relationships (404)
//! - [`QueryError`]: unusable `filter`/`sort` expressions (400)
//! - [`ValidationReport`]: per-field write failures, always aggregated (400)
//! - [`RequestError`]: malformed bodies and authorization failures
//!
//! Configuration problems are reported separately through [`ConfigError`];
//! they surface while building the server, never from a request.
//!
//! # Example
//!
//! ```rust,ignore
//! match operations.fetch(&ctx, "Person", "42").await {
//!     Ok(repr) => println!("{}", repr.href),
//!     Err(RestError::Resource(ResourceError::NotFound { key, .. })) => {
//!         println!("no person {}", key);
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::auth::Verb;

/// The main error type returned by resource operations and handlers
#[derive(Debug)]
pub enum RestError {
    /// Resource, record or relationship lookups that found nothing
    Resource(ResourceError),

    /// Filter and sort expression errors
    Query(QueryError),

    /// One or more submitted fields failed coercion
    Validation(ValidationReport),

    /// Request-level errors (body shape, authentication, authorization)
    Request(RequestError),

    /// The record store failed
    Storage(String),

    /// Internal engine errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::Resource(e) => write!(f, "{}", e),
            RestError::Query(e) => write!(f, "{}", e),
            RestError::Validation(report) => write!(f, "{}", report),
            RestError::Request(e) => write!(f, "{}", e),
            RestError::Storage(msg) => write!(f, "Storage error: {}", msg),
            RestError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RestError::Resource(e) => Some(e),
            RestError::Query(e) => Some(e),
            RestError::Validation(report) => Some(report),
            RestError::Request(e) => Some(e),
            RestError::Storage(_) | RestError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RestError {
    /// Shorthand for a 404 on a missing record
    pub fn not_found(resource: &str, key: &str) -> Self {
        RestError::Resource(ResourceError::NotFound {
            resource: resource.to_string(),
            key: key.to_string(),
        })
    }

    /// Shorthand for a malformed request body
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::Request(RequestError::InvalidBody {
            message: message.into(),
        })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::Resource(_) => StatusCode::NOT_FOUND,
            RestError::Query(_) => StatusCode::BAD_REQUEST,
            RestError::Validation(_) => StatusCode::BAD_REQUEST,
            RestError::Request(e) => e.status_code(),
            RestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            RestError::Resource(e) => e.error_code(),
            RestError::Query(e) => e.error_code(),
            RestError::Validation(_) => "VALIDATION_FAILED",
            RestError::Request(e) => e.error_code(),
            RestError::Storage(_) => "STORAGE_ERROR",
            RestError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            RestError::Validation(report) => Some(serde_json::json!({ "fields": report })),
            RestError::Resource(ResourceError::NotFound { resource, key }) => {
                Some(serde_json::json!({ "resource": resource, "key": key }))
            }
            RestError::Query(QueryError::BadFilterField { resource, field }) => {
                Some(serde_json::json!({ "resource": resource, "field": field }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Lookups that resolve to nothing; all map to 404
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// No schema is registered under this name
    UnknownResource { resource: String },

    /// No record with this key
    NotFound { resource: String, key: String },

    /// The schema has no reverse relationship with this name
    UnknownRelationship {
        resource: String,
        relationship: String,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::UnknownResource { resource } => {
                write!(f, "Unknown resource type '{}'", resource)
            }
            ResourceError::NotFound { resource, key } => {
                write!(f, "{} '{}' not found", resource, key)
            }
            ResourceError::UnknownRelationship {
                resource,
                relationship,
            } => write!(
                f,
                "'{}' is not a relationship of {}",
                relationship, resource
            ),
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::UnknownResource { .. } => "UNKNOWN_RESOURCE",
            ResourceError::NotFound { .. } => "NOT_FOUND",
            ResourceError::UnknownRelationship { .. } => "UNKNOWN_RELATIONSHIP",
        }
    }
}

impl From<ResourceError> for RestError {
    fn from(err: ResourceError) -> Self {
        RestError::Resource(err)
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised while turning `filter`/`sort` parameters into a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The expression names a field the schema does not declare
    BadFilterField { resource: String, field: String },

    /// The operator token is not one of `== != < <= > >= IN`
    BadOperator { operator: String },

    /// The value could not be decoded for the field's kind
    BadFilterValue { field: String, message: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::BadFilterField { resource, field } => {
                write!(f, "\"{}\" is not a valid field in {}", field, resource)
            }
            QueryError::BadOperator { operator } => write!(f, "Bad operator: {}", operator),
            QueryError::BadFilterValue { field, message } => {
                write!(f, "Bad value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl QueryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::BadFilterField { .. } => "BAD_FILTER_FIELD",
            QueryError::BadOperator { .. } => "BAD_OPERATOR",
            QueryError::BadFilterValue { .. } => "BAD_FILTER_VALUE",
        }
    }
}

impl From<QueryError> for RestError {
    fn from(err: QueryError) -> Self {
        RestError::Query(err)
    }
}

// =============================================================================
// Validation Report
// =============================================================================

/// Per-field write failures, keyed by field name
///
/// A write is rejected as a whole when the report is non-empty, and the
/// caller receives every entry at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport(BTreeMap<String, String>);

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`; the first message for a field wins
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Field names in the report, sorted
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing failed, otherwise the whole report as an error
    pub fn into_result(self) -> Result<(), RestError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RestError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "Invalid field values: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationReport {}

impl From<ValidationReport> for RestError {
    fn from(report: ValidationReport) -> Self {
        RestError::Validation(report)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors tied to the request itself rather than to a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Body is not JSON, or not a JSON object
    InvalidBody { message: String },

    /// The principal could not be resolved from the request
    Unauthorized { message: String },

    /// The authorizer declined the operation
    Forbidden {
        verb: Verb,
        resource: Option<String>,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
            RequestError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
            RequestError::Forbidden { verb, resource } => match resource {
                Some(resource) => write!(f, "Forbidden: {} on {}", verb, resource),
                None => write!(f, "Forbidden: {}", verb),
            },
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidBody { .. } => "BAD_REQUEST",
            RequestError::Unauthorized { .. } => "UNAUTHORIZED",
            RequestError::Forbidden { .. } => "FORBIDDEN",
        }
    }
}

impl From<RequestError> for RestError {
    fn from(err: RequestError) -> Self {
        RestError::Request(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::bad_request(err.to_string())
    }
}

/// Store implementations report failures through `anyhow`
impl From<anyhow::Error> for RestError {
    fn from(err: anyhow::Error) -> Self {
        RestError::Storage(format!("{:#}", err))
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors detected while loading configuration or building the registry
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate resource '{0}'")]
    DuplicateResource(String),

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("field '{resource}.{field}' references unknown resource '{target}'")]
    UnknownTarget {
        resource: String,
        field: String,
        target: String,
    },

    #[error("collection '{collection}' conflicts with an existing member of '{target}'")]
    CollectionConflict { target: String, collection: String },

    #[error("field '{resource}.{field}': {message}")]
    InvalidField {
        resource: String,
        field: String,
        message: String,
    },

    #[error("unknown auth policy '{0}'")]
    UnknownPolicy(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
