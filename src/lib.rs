//! REST api layer for schema-backed JSON documents.
//!
//! An [`Api`] routes `/{name}/{version}/...` requests to registered
//! [`resource::DocumentResource`]s, which hydrate, validate, and persist
//! documents through a pluggable [`store::DocumentStore`].

pub mod api;
pub mod auth;
pub mod bundle;
pub mod config;
pub mod errors;
pub mod fields;
pub mod filters;
pub mod logger;
pub mod paginator;
pub mod resource;
pub mod serializer;
pub mod server;
pub mod store;
pub mod throttle;
pub mod validation;

pub use api::Api;
pub use errors::ApiError;
pub use resource::DocumentResource;
