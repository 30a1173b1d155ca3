//! Schema registry clients.
//!
//! [`rest::RegistryRestService`] is the low-level HTTP client built from a
//! namespaced registry profile; [`client::SchemaRegistryClient`] layers the
//! format providers and the positive/negative schema caches on top of it.

pub mod client;
pub mod rest;

pub use client::{RegistrySchema, SchemaFormat, SchemaFormatProvider, SchemaRegistryClient};
pub use rest::{RegistryAuth, RegistryRestService};
