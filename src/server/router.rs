//! Router builder for resource routes

use axum::{
    Router,
    routing::{any, get},
};
use std::sync::Arc;

use crate::core::uri::normalize_prefix;
use crate::resources::handlers::{
    add_trailing_slash, create_resource, delete_related, delete_resource, delete_resources,
    get_resource, list_related, list_resources, replace_resource, site_index,
    strip_trailing_slash,
};
use crate::server::host::ServerHost;

/// Build resource routes under the configured mount prefix
///
/// These routes are generic and work for every registered resource:
/// - GET /                                    - Site index
/// - GET|POST|DELETE /{resource}/             - List, create, delete matching
/// - GET|PUT|DELETE /{resource}/{key}         - Fetch, replace, delete
/// - GET|DELETE /{resource}/{key}/{rel}/      - Related records
///
/// The slash-less or slash-terminated variants redirect (308) to the
/// canonical form.
pub fn build_resource_routes(host: Arc<ServerHost>) -> Router {
    let prefix = normalize_prefix(&host.settings().mount_prefix);
    let path = |template: &str| format!("{}{}", prefix, template);

    let mut router = Router::new();
    if !prefix.is_empty() {
        router = router.route(&prefix, any(add_trailing_slash));
    }

    router
        .route(&path("/"), get(site_index))
        .route(&path("/{resource}"), any(add_trailing_slash))
        .route(
            &path("/{resource}/"),
            get(list_resources)
                .post(create_resource)
                .delete(delete_resources),
        )
        .route(
            &path("/{resource}/{key}"),
            get(get_resource)
                .put(replace_resource)
                .delete(delete_resource),
        )
        .route(&path("/{resource}/{key}/"), any(strip_trailing_slash))
        .route(
            &path("/{resource}/{key}/{relationship}"),
            any(add_trailing_slash),
        )
        .route(
            &path("/{resource}/{key}/{relationship}/"),
            get(list_related).delete(delete_related),
        )
        .with_state(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::core::auth::AllowAll;
    use crate::core::schema::{FieldDescriptor, Schema};
    use crate::server::builder::ServerBuilder;
    use crate::storage::InMemoryRecordStore;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header::LOCATION};
    use tower::ServiceExt;

    fn router(prefix: &str) -> Router {
        let host = ServerBuilder::new()
            .with_store(InMemoryRecordStore::new())
            .with_authorizer(AllowAll)
            .with_settings(ServerConfig {
                mount_prefix: prefix.to_string(),
                ..ServerConfig::default()
            })
            .register_schema(Schema::new("Person").field("name", FieldDescriptor::string()))
            .build_host()
            .unwrap();
        build_resource_routes(Arc::new(host))
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, Option<String>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let location = response
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        (response.status(), location)
    }

    #[tokio::test]
    async fn test_canonical_paths() {
        let (status, _) = send(router(""), Method::GET, "/Person/").await;
        assert_eq!(status, StatusCode::OK);

        let (status, location) = send(router(""), Method::POST, "/Person").await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/Person/"));

        let (status, location) = send(router(""), Method::PUT, "/Person/1/?x=1").await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/Person/1?x=1"));
    }

    #[tokio::test]
    async fn test_prefix_root_redirects_to_index() {
        let (status, location) = send(router("api/"), Method::GET, "/api").await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/api/"));

        let (status, _) = send(router("api/"), Method::GET, "/api/").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(router("api/"), Method::GET, "/Person/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let (status, _) = send(router(""), Method::PATCH, "/Person/1").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
