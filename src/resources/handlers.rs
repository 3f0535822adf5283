//! HTTP handlers for resource operations
//!
//! Handlers are resource-agnostic: they resolve the request context, hand
//! the path segments to [`ResourceOperations`] and translate the outcome.
//!
//! [`ResourceOperations`]: crate::resources::operations::ResourceOperations

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, Uri, header::LOCATION},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::core::error::RestError;
use crate::core::query::QueryParams;
use crate::core::representation::Representation;
use crate::resources::operations::{Listing, SiteIndex};
use crate::server::host::ServerHost;

/// Body of a 303 response
#[derive(Debug, Serialize)]
pub struct Created {
    pub href: String,
}

/// `303 See Other` pointing at a record
fn see_other(uri: String) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(LOCATION, uri.clone())],
        Json(Created { href: uri }),
    )
        .into_response()
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, RestError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| RestError::bad_request(rejection.body_text()))
}

/// GET /
pub async fn site_index(
    State(host): State<Arc<ServerHost>>,
    headers: HeaderMap,
) -> Result<Json<SiteIndex>, RestError> {
    let ctx = host.context(&headers).await?;
    Ok(Json(host.operations.site_index(&ctx).await?))
}

/// GET /{resource}/
pub async fn list_resources(
    State(host): State<Arc<ServerHost>>,
    Path(resource): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<Listing>, RestError> {
    let ctx = host.context(&headers).await?;
    let params = QueryParams::from_pairs(&pairs);
    let results = host.operations.list(&ctx, &resource, &params).await?;
    Ok(Json(Listing { results }))
}

/// POST /{resource}/
pub async fn create_resource(
    State(host): State<Arc<ServerHost>>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, RestError> {
    let ctx = host.context(&headers).await?;
    let uri = host
        .operations
        .create(&ctx, &resource, json_body(body)?)
        .await?;
    Ok(see_other(uri))
}

/// DELETE /{resource}/
pub async fn delete_resources(
    State(host): State<Arc<ServerHost>>,
    Path(resource): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<StatusCode, RestError> {
    let ctx = host.context(&headers).await?;
    let params = QueryParams::from_pairs(&pairs);
    host.operations.delete_all(&ctx, &resource, &params).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /{resource}/{key}
pub async fn get_resource(
    State(host): State<Arc<ServerHost>>,
    Path((resource, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Representation>, RestError> {
    let ctx = host.context(&headers).await?;
    Ok(Json(host.operations.fetch(&ctx, &resource, &key).await?))
}

/// PUT /{resource}/{key}
pub async fn replace_resource(
    State(host): State<Arc<ServerHost>>,
    Path((resource, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, RestError> {
    let ctx = host.context(&headers).await?;
    let uri = host
        .operations
        .replace(&ctx, &resource, &key, json_body(body)?)
        .await?;
    Ok(see_other(uri))
}

/// DELETE /{resource}/{key}
pub async fn delete_resource(
    State(host): State<Arc<ServerHost>>,
    Path((resource, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, RestError> {
    let ctx = host.context(&headers).await?;
    host.operations.delete_one(&ctx, &resource, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /{resource}/{key}/{relationship}/
pub async fn list_related(
    State(host): State<Arc<ServerHost>>,
    Path((resource, key, relationship)): Path<(String, String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<Listing>, RestError> {
    let ctx = host.context(&headers).await?;
    let params = QueryParams::from_pairs(&pairs);
    let results = host
        .operations
        .list_related(&ctx, &resource, &key, &relationship, &params)
        .await?;
    Ok(Json(Listing { results }))
}

/// DELETE /{resource}/{key}/{relationship}/
pub async fn delete_related(
    State(host): State<Arc<ServerHost>>,
    Path((resource, key, relationship)): Path<(String, String, String)>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<StatusCode, RestError> {
    let ctx = host.context(&headers).await?;
    let params = QueryParams::from_pairs(&pairs);
    host.operations
        .delete_related(&ctx, &resource, &key, &relationship, &params)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn with_query(path: String, uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    }
}

/// `/x` → `/x/`, keeping the method and query
pub async fn add_trailing_slash(uri: Uri) -> Redirect {
    Redirect::permanent(&with_query(format!("{}/", uri.path()), &uri))
}

/// `/x/` → `/x`, keeping the method and query
pub async fn strip_trailing_slash(uri: Uri) -> Redirect {
    let path = uri.path().trim_end_matches('/').to_string();
    Redirect::permanent(&with_query(path, &uri))
}
