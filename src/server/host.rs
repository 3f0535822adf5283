//! Server host for transport-agnostic API exposure
//!
//! `ServerHost` holds everything a request needs, independent of how the API
//! is exposed: the resource operations (registry, store, authorizer,
//! settings) and the principal resolver.

use axum::http::HeaderMap;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::auth::PrincipalResolver;
use crate::core::error::{RequestError, RestError};
use crate::core::uri::UriBuilder;
use crate::resources::operations::{RequestContext, ResourceOperations};
use crate::resources::registry::SchemaRegistry;

/// Host context containing all engine state
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerBuilder::new().with_config(config)?.build_host()?);
/// let app = RestExposure::build_router(host, vec![])?;
/// ```
pub struct ServerHost {
    /// CRUD pipelines shared by every route
    pub operations: Arc<ResourceOperations>,

    /// Turns request headers into a principal
    pub principals: Arc<dyn PrincipalResolver>,
}

impl ServerHost {
    pub fn new(operations: ResourceOperations, principals: Arc<dyn PrincipalResolver>) -> Self {
        Self {
            operations: Arc::new(operations),
            principals,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.operations.registry()
    }

    pub fn settings(&self) -> &ServerConfig {
        self.operations.settings()
    }

    /// Resource names registered in the host
    pub fn resource_names(&self) -> Vec<&str> {
        self.registry().names().collect()
    }

    /// Per-request context: resolved principal and URI builder
    ///
    /// A principal that cannot be resolved rejects the request as 401.
    pub async fn context(&self, headers: &HeaderMap) -> Result<RequestContext, RestError> {
        let principal = self.principals.resolve(headers).await.map_err(|e| {
            tracing::warn!(error = %e, "could not resolve principal");
            RestError::from(RequestError::Unauthorized {
                message: e.to_string(),
            })
        })?;

        let settings = self.settings();
        let uris = UriBuilder::for_request(
            settings.base_url.as_deref(),
            &settings.mount_prefix,
            headers,
        );
        Ok(RequestContext::new(principal, uris))
    }
}
