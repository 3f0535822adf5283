//! Shared test harness for the REST integration tests
//!
//! Provides fixture schemas (`Person`, `Pet`), a server wired to an
//! in-memory store, and helpers for the create-then-follow flow.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum_test::TestServer;
use hyperrest::prelude::*;

/// Origin of every generated URI in tests
pub const BASE: &str = "http://api.test";

/// `Person` with every scalar kind plus a self-reference, and `Pet`
/// pointing at its owner
pub fn fixture_schemas() -> Vec<Schema> {
    vec![
        Schema::new("Person")
            .field("name", FieldDescriptor::string().required())
            .field("age", FieldDescriptor::integer())
            .field("height", FieldDescriptor::float())
            .field("retired", FieldDescriptor::boolean())
            .field("bio", FieldDescriptor::text())
            .field("photo", FieldDescriptor::blob())
            .field("born", FieldDescriptor::date())
            .field("wakes", FieldDescriptor::time())
            .field("joined", FieldDescriptor::datetime())
            .field(
                "boss",
                FieldDescriptor::reference("Person").with_collection("reports"),
            ),
        Schema::new("Pet")
            .field("name", FieldDescriptor::string().required())
            .field("species", FieldDescriptor::string_with_max(20))
            .field(
                "owner",
                FieldDescriptor::reference("Person").with_collection("pets"),
            ),
    ]
}

pub fn settings() -> ServerConfig {
    ServerConfig {
        base_url: Some(BASE.to_string()),
        ..ServerConfig::default()
    }
}

pub struct Harness {
    pub server: TestServer,
    pub store: InMemoryRecordStore,
}

/// Open API over the fixture schemas
pub fn harness() -> Harness {
    harness_with(ServerBuilder::new().with_authorizer(AllowAll), settings())
}

/// Fixture schemas and a fresh store on top of a partially built builder
pub fn harness_with(builder: ServerBuilder, settings: ServerConfig) -> Harness {
    let store = InMemoryRecordStore::new();
    let app = builder
        .with_store(store.clone())
        .with_settings(settings)
        .register_schemas(fixture_schemas())
        .build()
        .expect("Failed to build app");

    let server = TestServer::new(app).expect("Failed to create test server");
    Harness { server, store }
}

/// Path part of an absolute test URI
pub fn path_of(uri: &str) -> &str {
    uri.strip_prefix(BASE).unwrap_or(uri)
}

/// POST a record and return the path it was created at
pub async fn create(server: &TestServer, resource: &str, body: Value) -> String {
    let response = server.post(&format!("/{}/", resource)).json(&body).await;
    response.assert_status(StatusCode::SEE_OTHER);

    let location = response.header(LOCATION);
    let location = location.to_str().expect("ascii location");
    path_of(location).to_string()
}

/// Keys of a `{"results": [...]}` body, in order
pub fn result_keys(body: &Value) -> Vec<Value> {
    body["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|r| r["key"].clone())
        .collect()
}

/// Seed `Person` records with literal integer keys 1..=n and the given ages
pub async fn seed_people(server: &TestServer, ages: &[i64]) {
    for (i, age) in ages.iter().enumerate() {
        create(
            server,
            "Person",
            json!({ "key": i + 1, "name": format!("person-{}", i + 1), "age": age }),
        )
        .await;
    }
}
