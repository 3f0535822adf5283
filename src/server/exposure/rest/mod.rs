//! REST API exposure for the engine
//!
//! This module provides REST-specific routing. It consumes a `ServerHost`
//! and produces an Axum `Router`.

use super::super::host::ServerHost;
use crate::server::router::build_resource_routes;
use anyhow::Result;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a fully configured Axum router with:
    /// - Health check routes (outside the mount prefix)
    /// - Resource routes
    /// - Custom routes
    /// - HTTP request tracing
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        if host.registry().is_empty() {
            tracing::warn!("no resources registered; only the site index will be served");
        }

        let mut app = Self::health_routes().merge(build_resource_routes(host));

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "hyperrest"
        }))
    }
}
