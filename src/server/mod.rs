//! Server module for building HTTP servers over the registered resources
//!
//! `ServerBuilder` collects schemas, the store, the authorizer and settings,
//! builds a transport-agnostic `ServerHost`, and exposes it through
//! `RestExposure`.

pub mod builder;
pub mod exposure;
pub mod host;
pub mod router;

pub use builder::ServerBuilder;
pub use exposure::RestExposure;
pub use host::ServerHost;
