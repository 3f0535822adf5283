//! Resource layer: schema registry, operations and HTTP handlers

pub mod handlers;
pub mod operations;
pub mod registry;

pub use operations::{Listing, RequestContext, ResourceOperations, SiteIndex};
pub use registry::SchemaRegistry;
