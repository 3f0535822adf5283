//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::ServerHost;
use crate::config::{ApiConfig, ServerConfig};
use crate::core::auth::{AnonymousResolver, Authorizer, PrincipalResolver};
use crate::core::schema::Schema;
use crate::core::store::RecordStore;
use crate::resources::operations::ResourceOperations;
use crate::resources::registry::SchemaRegistry;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for creating HTTP servers over a set of schemas
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_store(InMemoryRecordStore::new())
///     .with_authorizer(AllowAll)
///     .register_schema(person)
///     .build()?;
/// ```
pub struct ServerBuilder {
    store: Option<Arc<dyn RecordStore>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    principals: Option<Arc<dyn PrincipalResolver>>,
    settings: ServerConfig,
    schemas: Vec<Schema>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            store: None,
            authorizer: None,
            principals: None,
            settings: ServerConfig::default(),
            schemas: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Set the record store (required)
    pub fn with_store(mut self, store: impl RecordStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the authorizer (required; use `AllowAll` for an open API)
    pub fn with_authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    /// Set how principals are read from requests (default: anonymous)
    pub fn with_principal_resolver(mut self, resolver: impl PrincipalResolver + 'static) -> Self {
        self.principals = Some(Arc::new(resolver));
        self
    }

    pub fn with_settings(mut self, settings: ServerConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Register a schema
    pub fn register_schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn register_schemas(mut self, schemas: impl IntoIterator<Item = Schema>) -> Self {
        self.schemas.extend(schemas);
        self
    }

    /// Apply a loaded configuration
    ///
    /// This will:
    /// 1. Use its server settings
    /// 2. Register every configured resource
    /// 3. Install a policy authorizer built from its `auth` sections
    pub fn with_config(self, config: ApiConfig) -> Result<Self> {
        let schemas = config.schemas()?;
        let authorizer = config.authorizer()?;

        Ok(self
            .with_settings(config.server)
            .register_schemas(schemas)
            .with_authorizer(authorizer))
    }

    /// Add custom routes to the server
    ///
    /// Use this for routes outside the resource model, such as login or
    /// webhook endpoints. Custom routes are not mounted under the prefix.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    ///
    /// Fails when the schemas do not form a valid registry or a required
    /// collaborator is missing.
    pub fn build_host(mut self) -> Result<ServerHost> {
        let registry = SchemaRegistry::new(std::mem::take(&mut self.schemas))?;

        let store = self
            .store
            .take()
            .ok_or_else(|| anyhow::anyhow!("RecordStore is required. Call .with_store()"))?;

        let authorizer = self.authorizer.take().ok_or_else(|| {
            anyhow::anyhow!("Authorizer is required. Call .with_authorizer() (AllowAll for open APIs)")
        })?;

        let principals = self
            .principals
            .take()
            .unwrap_or_else(|| Arc::new(AnonymousResolver));

        if self.settings.max_limit.is_some_and(|max| max == 0) {
            return Err(anyhow::anyhow!("max_limit must be at least 1"));
        }

        tracing::info!(
            resources = registry.len(),
            prefix = %self.settings.mount_prefix,
            "built server host"
        );

        let operations = ResourceOperations::new(
            Arc::new(registry),
            store,
            authorizer,
            Arc::new(self.settings),
        );
        Ok(ServerHost::new(operations, principals))
    }

    /// Build the final REST router
    ///
    /// Note: This is a convenience method that builds the host and immediately
    /// exposes it via REST.
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        RestExposure::build_router(host, custom_routes)
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
