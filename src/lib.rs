//! # fleetstream
//!
//! A multi-cluster Kafka resource manager. `fleetstream` turns declarative
//! per-cluster connection profiles into live, ready-to-use clients for the
//! broker's administrative, producer and consumer surfaces, a Confluent-style
//! schema registry, and Kafka Connect services, and multiplexes message
//! payloads across registry-governed and schema-less wire encodings.
//!
//! The crate is a library boundary consumed in-process by a GUI (or any other
//! embedding): callers hand over a cluster id, the manager resolves or builds
//! the connection profile, constructs the client at most once per key, and
//! returns a shared handle.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fleetstream::{ClusterDefinition, ClusterManager, StaticCatalog};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = StaticCatalog::new()
//!         .with_cluster(ClusterDefinition::new("local", "localhost:9092"));
//!     let manager = ClusterManager::new(Arc::new(catalog));
//!
//!     let admin = manager.get_admin_client("local").await?;
//!     for topic in admin.list_topics().await? {
//!         println!("{} ({} partitions)", topic.name, topic.partitions);
//!     }
//!
//!     manager.close().await;
//!     Ok(())
//! }
//! ```

pub mod fleet;

// Re-export the primary entry points at the crate root.
pub use fleet::config::{
    ClusterAuth, ClusterCatalog, ClusterDefinition, ConnectDefinition, SaslConfig, SaslMechanism,
    SaslProtocol, SchemaRegistryDefinition, StaticCatalog, TlsConfig,
};
pub use fleet::error::ClusterError;
pub use fleet::manager::ClusterManager;
pub use fleet::profile::ConnectionProfile;
pub use fleet::serialization::{
    PayloadRole, PrimitiveType, SerdeFactory, SerializationError, WireFormat,
};
