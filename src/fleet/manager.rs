//! The per-cluster resource cache and client factory.
//!
//! [`ClusterManager`] is a passive, thread-safe shared object: arbitrary
//! caller threads ask it for admin, producer, consumer, registry and connect
//! handles by cluster id, and every cache provides at-most-once construction
//! per key under concurrent first access. Construction may block on network or
//! disk I/O (TLS stores, registry handshakes); callers are expected to already
//! be off any UI-blocking thread. The manager owns every cached entry; callers
//! receive shared handles without ownership transfer.

use crate::fleet::admin::BrokerAdminClient;
use crate::fleet::cache::CacheMap;
use crate::fleet::config::{ClusterCatalog, ClusterDefinition};
use crate::fleet::connect::ConnectClient;
use crate::fleet::consumer::ClusterConsumer;
use crate::fleet::error::ClusterError;
use crate::fleet::producer::ClusterProducer;
use crate::fleet::profile::{self, keys, ConnectionProfile};
use crate::fleet::registry::{RegistryRestService, SchemaRegistryClient};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Grace period granted to each admin client before its shutdown is forced.
pub const ADMIN_CLOSE_GRACE: Duration = Duration::from_millis(5_000);

pub struct ClusterManager {
    catalog: Arc<dyn ClusterCatalog>,
    admin_clients: CacheMap<String, Arc<BrokerAdminClient>>,
    registry_clients: CacheMap<String, Arc<SchemaRegistryClient>>,
    connect_clients: CacheMap<(String, String), Arc<ConnectClient>>,
    /// Cached *configuration*, not live handles: producers and consumers are
    /// constructed fresh on every call from these shared profiles.
    producer_profiles: Mutex<HashMap<String, Arc<Mutex<ConnectionProfile>>>>,
    consumer_profiles: Mutex<HashMap<String, Arc<Mutex<ConnectionProfile>>>>,
}

impl ClusterManager {
    /// Create a manager over a cluster catalog. All caches are owned by this
    /// instance and torn down by [`close`](Self::close); nothing is
    /// process-global.
    pub fn new(catalog: Arc<dyn ClusterCatalog>) -> Self {
        Self {
            catalog,
            admin_clients: CacheMap::new(),
            registry_clients: CacheMap::new(),
            connect_clients: CacheMap::new(),
            producer_profiles: Mutex::new(HashMap::new()),
            consumer_profiles: Mutex::new(HashMap::new()),
        }
    }

    async fn definition(&self, cluster: &str) -> Result<ClusterDefinition, ClusterError> {
        self.catalog
            .cluster(cluster)
            .await
            .ok_or_else(|| ClusterError::UnknownCluster(cluster.to_string()))
    }

    // ---- admin ----------------------------------------------------------

    /// Direct, uncached admin factory; exposed separately so tests can drive
    /// it with a hand-built profile.
    pub fn create_admin_client(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<BrokerAdminClient, ClusterError> {
        BrokerAdminClient::from_profile(profile)
    }

    /// The cluster's admin handle, constructed at most once.
    pub async fn get_admin_client(
        &self,
        cluster: &str,
    ) -> Result<Arc<BrokerAdminClient>, ClusterError> {
        let definition = self.definition(cluster).await?;
        self.admin_clients
            .get_or_try_create(&cluster.to_string(), || async move {
                log::info!("Creating admin client for cluster {}", definition.name);
                let broker_profile = profile::broker_profile(&definition);
                Ok(Arc::new(self.create_admin_client(&broker_profile)?))
            })
            .await
    }

    // ---- producer / consumer --------------------------------------------

    /// A brand-new producer built from the cluster's cached producer
    /// configuration.
    ///
    /// Unlike the other handles, the *configuration* is what is cached:
    /// overrides supplied here are merged into the shared configuration
    /// object in place, so they persist and affect subsequent calls for the
    /// same cluster until overridden again. Concurrent calls supplying
    /// overrides for the same cluster race on that shared object; this is an
    /// accepted, documented limitation of the override-accumulation contract.
    pub async fn get_producer(
        &self,
        cluster: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> Result<ClusterProducer, ClusterError> {
        let shared = self
            .shared_profile(&self.producer_profiles, cluster, false)
            .await?;
        let snapshot = {
            let mut cached = shared.lock().await;
            if let Some(overrides) = overrides {
                cached.merge(overrides);
            }
            cached.clone()
        };
        ClusterProducer::from_profile(&snapshot)
    }

    /// A brand-new consumer built from the cluster's cached consumer
    /// configuration; same override-accumulation contract as
    /// [`get_producer`](Self::get_producer). A default group id derived from
    /// the cluster id is installed when the profile carries none.
    pub async fn get_consumer(
        &self,
        cluster: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> Result<ClusterConsumer, ClusterError> {
        let shared = self
            .shared_profile(&self.consumer_profiles, cluster, true)
            .await?;
        let snapshot = {
            let mut cached = shared.lock().await;
            if let Some(overrides) = overrides {
                cached.merge(overrides);
            }
            cached.clone()
        };
        ClusterConsumer::from_profile(&snapshot)
    }

    /// The effective (cumulatively overridden) producer configuration, if one
    /// is cached.
    pub async fn producer_configuration(&self, cluster: &str) -> Option<ConnectionProfile> {
        let profiles = self.producer_profiles.lock().await;
        match profiles.get(cluster) {
            Some(shared) => Some(shared.lock().await.clone()),
            None => None,
        }
    }

    /// The effective (cumulatively overridden) consumer configuration, if one
    /// is cached.
    pub async fn consumer_configuration(&self, cluster: &str) -> Option<ConnectionProfile> {
        let profiles = self.consumer_profiles.lock().await;
        match profiles.get(cluster) {
            Some(shared) => Some(shared.lock().await.clone()),
            None => None,
        }
    }

    async fn shared_profile(
        &self,
        profiles: &Mutex<HashMap<String, Arc<Mutex<ConnectionProfile>>>>,
        cluster: &str,
        default_group: bool,
    ) -> Result<Arc<Mutex<ConnectionProfile>>, ClusterError> {
        {
            let cached = profiles.lock().await;
            if let Some(shared) = cached.get(cluster) {
                return Ok(shared.clone());
            }
        }

        // Double-checked insert: build the profile outside the lock, then
        // keep whichever entry won the race.
        let definition = self.definition(cluster).await?;
        let mut built = profile::broker_profile(&definition);
        if default_group && !built.contains_key(keys::GROUP_ID) {
            built.set(keys::GROUP_ID, format!("{}-fleetstream", cluster));
        }

        let mut cached = profiles.lock().await;
        Ok(cached
            .entry(cluster.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(built)))
            .clone())
    }

    // ---- schema registry -------------------------------------------------

    /// Direct, uncached REST-service factory for a namespaced registry
    /// profile.
    pub fn create_schema_registry_rest_service(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<RegistryRestService, ClusterError> {
        RegistryRestService::from_profile(profile)
    }

    /// The cluster's caching registry client, constructed at most once.
    pub async fn get_schema_registry_client(
        &self,
        cluster: &str,
    ) -> Result<Arc<SchemaRegistryClient>, ClusterError> {
        let definition = self.definition(cluster).await?;
        let registry = definition
            .schema_registry
            .clone()
            .ok_or_else(|| ClusterError::RegistryNotDefined(cluster.to_string()))?;

        self.registry_clients
            .get_or_try_create(&cluster.to_string(), || async move {
                log::info!(
                    "Creating schema registry client for cluster {} at {}",
                    definition.name,
                    registry.url
                );
                let registry_profile = profile::registry_profile(&registry);
                let rest = self.create_schema_registry_rest_service(&registry_profile)?;
                Ok(Arc::new(SchemaRegistryClient::from_profile(
                    rest,
                    &registry_profile,
                )?))
            })
            .await
    }

    // ---- connect ---------------------------------------------------------

    /// Direct, uncached connect factory for a generic connect profile.
    pub fn create_connect_client(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectClient, ClusterError> {
        ConnectClient::from_profile(profile)
    }

    /// The connect client for one `(cluster, connect)` pair, constructed at
    /// most once per pair.
    pub async fn get_connect_client(
        &self,
        cluster: &str,
        connect: &str,
    ) -> Result<Arc<ConnectClient>, ClusterError> {
        let definition = self.definition(cluster).await?;
        let connect_definition = definition
            .connect_by_name(connect)
            .cloned()
            .ok_or_else(|| ClusterError::UnknownConnect {
                cluster: cluster.to_string(),
                connect: connect.to_string(),
            })?;

        self.connect_clients
            .get_or_try_create(
                &(cluster.to_string(), connect.to_string()),
                || async move {
                    log::info!(
                        "Creating connect client {} for cluster {} at {}",
                        connect_definition.name,
                        cluster,
                        connect_definition.url
                    );
                    let connect_profile = profile::connect_profile(&connect_definition);
                    Ok(Arc::new(self.create_connect_client(&connect_profile)?))
                },
            )
            .await
    }

    /// Eagerly resolve a client for every connect declared on the cluster.
    pub async fn get_connect_clients(
        &self,
        cluster: &str,
    ) -> Result<HashMap<String, Arc<ConnectClient>>, ClusterError> {
        let definition = self.definition(cluster).await?;
        let mut clients = HashMap::new();
        for connect in &definition.connects {
            let client = self.get_connect_client(cluster, &connect.name).await?;
            clients.insert(connect.name.clone(), client);
        }
        Ok(clients)
    }

    // ---- definedness -----------------------------------------------------

    /// Whether the cluster declares a schema registry. Decided by the
    /// catalog, never by cached state.
    pub async fn schema_registry_is_defined(&self, cluster: &str) -> bool {
        self.catalog
            .cluster(cluster)
            .await
            .map(|definition| definition.schema_registry.is_some())
            .unwrap_or(false)
    }

    /// Whether the cluster declares any connect service. Decided by the
    /// catalog, never by cached state.
    pub async fn connects_is_defined(&self, cluster: &str) -> bool {
        self.catalog
            .cluster(cluster)
            .await
            .map(|definition| !definition.connects.is_empty())
            .unwrap_or(false)
    }

    // ---- shutdown --------------------------------------------------------

    /// Global shutdown: close every admin handle with the bounded grace
    /// period, drop the producer/consumer configurations, reset (not close)
    /// every registry client, and clear the connect cache. Connect handles
    /// expose no close operation; dropping them is the whole protocol.
    pub async fn close(&self) {
        for (cluster, admin) in self.admin_clients.drain().await {
            log::info!("Closing admin client for cluster {}", cluster);
            admin.close(ADMIN_CLOSE_GRACE).await;
        }

        self.producer_profiles.lock().await.clear();
        self.consumer_profiles.lock().await.clear();

        for (cluster, registry) in self.registry_clients.drain().await {
            log::debug!("Resetting schema registry client for cluster {}", cluster);
            registry.reset().await;
        }

        self.connect_clients.drain().await;
    }

    /// Scoped shutdown: same protocol as [`close`](Self::close) but only for
    /// one cluster's entries; every other cluster's handles stay cached and
    /// usable.
    pub async fn close_cluster(&self, cluster: &str) {
        if let Some(admin) = self.admin_clients.remove(&cluster.to_string()).await {
            log::info!("Closing admin client for cluster {}", cluster);
            admin.close(ADMIN_CLOSE_GRACE).await;
        }

        self.producer_profiles.lock().await.remove(cluster);
        self.consumer_profiles.lock().await.remove(cluster);

        if let Some(registry) = self.registry_clients.remove(&cluster.to_string()).await {
            log::debug!("Resetting schema registry client for cluster {}", cluster);
            registry.reset().await;
        }

        self.connect_clients
            .remove_matching(|(owner, _)| owner == cluster)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::config::{ClusterDefinition, ConnectDefinition, SchemaRegistryDefinition, StaticCatalog};

    fn manager() -> ClusterManager {
        let catalog = StaticCatalog::new()
            .with_cluster(
                ClusterDefinition::new("alpha", "localhost:9092")
                    .schema_registry(SchemaRegistryDefinition::new("http://registry:8081"))
                    .connect(ConnectDefinition::new("cdc", "http://connect:8083")),
            )
            .with_cluster(ClusterDefinition::new("beta", "localhost:9093"));
        ClusterManager::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn test_admin_client_cached_per_cluster() {
        let manager = manager();

        let first = manager.get_admin_client("alpha").await.unwrap();
        let second = manager.get_admin_client("alpha").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = manager.get_admin_client("beta").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_an_error() {
        let manager = manager();
        match manager.get_admin_client("gamma").await {
            Err(ClusterError::UnknownCluster(name)) => assert_eq!(name, "gamma"),
            other => panic!("expected UnknownCluster, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_registry_client_requires_definition() {
        let manager = manager();
        assert!(manager.get_schema_registry_client("alpha").await.is_ok());
        match manager.get_schema_registry_client("beta").await {
            Err(ClusterError::RegistryNotDefined(name)) => assert_eq!(name, "beta"),
            other => panic!("expected RegistryNotDefined, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_registry_client_cached() {
        let manager = manager();
        let first = manager.get_schema_registry_client("alpha").await.unwrap();
        let second = manager.get_schema_registry_client("alpha").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_connect_client_cached_per_pair() {
        let manager = manager();
        let first = manager.get_connect_client("alpha", "cdc").await.unwrap();
        let second = manager.get_connect_client("alpha", "cdc").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        match manager.get_connect_client("alpha", "missing").await {
            Err(ClusterError::UnknownConnect { connect, .. }) => assert_eq!(connect, "missing"),
            other => panic!("expected UnknownConnect, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_get_connect_clients_resolves_all() {
        let manager = manager();
        let clients = manager.get_connect_clients("alpha").await.unwrap();
        assert_eq!(clients.len(), 1);
        assert!(clients.contains_key("cdc"));

        let clients = manager.get_connect_clients("beta").await.unwrap();
        assert!(clients.is_empty());
    }

    #[tokio::test]
    async fn test_producer_overrides_accumulate() {
        let manager = manager();

        manager
            .get_producer(
                "alpha",
                Some(HashMap::from([(
                    "linger.ms".to_string(),
                    "5".to_string(),
                )])),
            )
            .await
            .unwrap();

        // The override persists into the next call without being resupplied.
        manager.get_producer("alpha", None).await.unwrap();
        let configuration = manager.producer_configuration("alpha").await.unwrap();
        assert_eq!(configuration.get("linger.ms"), Some("5"));

        // Resupplying replaces the accumulated value.
        manager
            .get_producer(
                "alpha",
                Some(HashMap::from([(
                    "linger.ms".to_string(),
                    "10".to_string(),
                )])),
            )
            .await
            .unwrap();
        let configuration = manager.producer_configuration("alpha").await.unwrap();
        assert_eq!(configuration.get("linger.ms"), Some("10"));
    }

    #[tokio::test]
    async fn test_consumer_gets_default_group_id() {
        let manager = manager();
        manager.get_consumer("alpha", None).await.unwrap();

        let configuration = manager.consumer_configuration("alpha").await.unwrap();
        assert_eq!(configuration.get(keys::GROUP_ID), Some("alpha-fleetstream"));
    }

    #[tokio::test]
    async fn test_definedness_delegates_to_catalog() {
        let manager = manager();
        assert!(manager.schema_registry_is_defined("alpha").await);
        assert!(!manager.schema_registry_is_defined("beta").await);
        assert!(!manager.schema_registry_is_defined("gamma").await);

        assert!(manager.connects_is_defined("alpha").await);
        assert!(!manager.connects_is_defined("beta").await);
    }

    #[tokio::test]
    async fn test_close_cluster_is_scoped() {
        let manager = manager();

        let alpha_admin = manager.get_admin_client("alpha").await.unwrap();
        let beta_admin = manager.get_admin_client("beta").await.unwrap();
        manager.get_producer("alpha", None).await.unwrap();
        let alpha_connect = manager.get_connect_client("alpha", "cdc").await.unwrap();

        manager.close_cluster("alpha").await;

        // Alpha's entries are gone; the closed handle rejects further use.
        assert!(alpha_admin.is_closed().await);
        assert!(manager.producer_configuration("alpha").await.is_none());
        let rebuilt = manager.get_connect_client("alpha", "cdc").await.unwrap();
        assert!(!Arc::ptr_eq(&alpha_connect, &rebuilt));

        // Beta's handle is intact and still cached.
        assert!(!beta_admin.is_closed().await);
        let beta_again = manager.get_admin_client("beta").await.unwrap();
        assert!(Arc::ptr_eq(&beta_admin, &beta_again));
    }

    #[tokio::test]
    async fn test_close_clears_everything() {
        let manager = manager();

        let admin = manager.get_admin_client("alpha").await.unwrap();
        manager.get_producer("alpha", None).await.unwrap();
        manager.get_consumer("alpha", None).await.unwrap();
        manager.get_connect_client("alpha", "cdc").await.unwrap();

        manager.close().await;

        assert!(admin.is_closed().await);
        assert!(manager.producer_configuration("alpha").await.is_none());
        assert!(manager.consumer_configuration("alpha").await.is_none());

        // The manager remains usable: caches repopulate on demand.
        let rebuilt = manager.get_admin_client("alpha").await.unwrap();
        assert!(!Arc::ptr_eq(&admin, &rebuilt));
    }
}
