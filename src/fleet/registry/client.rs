//! Caching schema registry client.
//!
//! Layers three caches over [`RegistryRestService`]: a bounded LRU of schemas
//! by id, and two negative caches (missing ids and missing subjects) whose
//! TTLs come from the registry profile's cache-tuning entries. Three schema
//! format providers (Avro, JSON Schema, Protobuf) are registered at
//! construction and validate every schema the registry hands back.
//!
//! `reset` drops the caches but leaves the client usable; it is the scoped
//! shutdown operation the manager applies instead of a full close.

use crate::fleet::error::ClusterError;
use crate::fleet::profile::{
    keys, ConnectionProfile, MISSING_CACHE_DEFAULT_SIZE, MISSING_ID_CACHE_DEFAULT_TTL_MS,
    MISSING_SCHEMA_CACHE_DEFAULT_TTL_MS,
};
use crate::fleet::registry::rest::RegistryRestService;
use apache_avro::Schema as AvroSchema;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Identifier cache capacity; fixed at construction by the manager.
pub const IDENTIFIER_CACHE_CAPACITY: usize = 256;

/// Wire-level schema format as reported by the registry's `schemaType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaFormat {
    Avro,
    Json,
    Protobuf,
}

impl SchemaFormat {
    /// Map the registry's `schemaType` value; an absent field means Avro.
    pub fn from_registry_type(schema_type: Option<&str>) -> Option<Self> {
        match schema_type {
            None | Some("AVRO") => Some(SchemaFormat::Avro),
            Some("JSON") => Some(SchemaFormat::Json),
            Some("PROTOBUF") => Some(SchemaFormat::Protobuf),
            Some(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFormat::Avro => "AVRO",
            SchemaFormat::Json => "JSON",
            SchemaFormat::Protobuf => "PROTOBUF",
        }
    }
}

/// One resolved schema.
#[derive(Debug, Clone)]
pub struct RegistrySchema {
    pub id: u32,
    pub subject: Option<String>,
    pub version: Option<i32>,
    pub format: SchemaFormat,
    pub definition: String,
}

/// Validates schema definitions of one format.
pub trait SchemaFormatProvider: Send + Sync {
    fn format(&self) -> SchemaFormat;
    fn validate(&self, definition: &str) -> Result<(), ClusterError>;
}

struct AvroFormatProvider;

impl SchemaFormatProvider for AvroFormatProvider {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::Avro
    }

    fn validate(&self, definition: &str) -> Result<(), ClusterError> {
        AvroSchema::parse_str(definition)
            .map(|_| ())
            .map_err(|e| ClusterError::Schema(format!("invalid Avro schema: {}", e)))
    }
}

struct JsonFormatProvider;

impl SchemaFormatProvider for JsonFormatProvider {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::Json
    }

    fn validate(&self, definition: &str) -> Result<(), ClusterError> {
        serde_json::from_str::<serde_json::Value>(definition)
            .map(|_| ())
            .map_err(|e| ClusterError::Schema(format!("invalid JSON schema: {}", e)))
    }
}

struct ProtobufFormatProvider;

impl SchemaFormatProvider for ProtobufFormatProvider {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::Protobuf
    }

    fn validate(&self, definition: &str) -> Result<(), ClusterError> {
        if definition.trim().is_empty() {
            return Err(ClusterError::Schema("empty protobuf schema".to_string()));
        }
        Ok(())
    }
}

/// Bounded LRU of schemas by id.
struct IdentifierCache {
    schemas: HashMap<u32, RegistrySchema>,
    lru_order: VecDeque<u32>,
    capacity: usize,
}

impl IdentifierCache {
    fn new(capacity: usize) -> Self {
        Self {
            schemas: HashMap::new(),
            lru_order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&mut self, id: u32) -> Option<RegistrySchema> {
        let schema = self.schemas.get(&id).cloned()?;
        self.touch(id);
        Some(schema)
    }

    fn put(&mut self, schema: RegistrySchema) {
        let id = schema.id;
        if self.schemas.insert(id, schema).is_none() && self.schemas.len() > self.capacity {
            if let Some(evicted) = self.lru_order.pop_front() {
                self.schemas.remove(&evicted);
                log::debug!("Evicted schema id {} from identifier cache", evicted);
            }
        }
        self.touch(id);
    }

    fn touch(&mut self, id: u32) {
        self.lru_order.retain(|entry| *entry != id);
        self.lru_order.push_back(id);
    }

    fn clear(&mut self) {
        self.schemas.clear();
        self.lru_order.clear();
    }
}

/// Bounded negative cache with per-entry expiry.
struct MissingCache<K> {
    entries: HashMap<K, Instant>,
    capacity: usize,
    ttl: Duration,
}

impl<K: std::hash::Hash + Eq + Clone> MissingCache<K> {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            ttl,
        }
    }

    fn is_missing(&mut self, key: &K) -> bool {
        match self.entries.get(key) {
            Some(recorded) if recorded.elapsed() < self.ttl => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    fn record(&mut self, key: K) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries.retain(|_, recorded| recorded.elapsed() < self.ttl);
            if self.entries.len() >= self.capacity {
                // Still full of fresh entries: drop the oldest one.
                if let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, recorded)| **recorded)
                    .map(|(key, _)| key.clone())
                {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(key, Instant::now());
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct SchemaRegistryClient {
    rest: RegistryRestService,
    providers: Vec<Arc<dyn SchemaFormatProvider>>,
    id_cache: Mutex<IdentifierCache>,
    missing_ids: Mutex<MissingCache<u32>>,
    missing_subjects: Mutex<MissingCache<String>>,
}

impl SchemaRegistryClient {
    /// Build the caching client over an already-constructed REST service,
    /// reading the cache-tuning entries from the registry profile. The three
    /// format providers are always registered.
    pub fn from_profile(
        rest: RegistryRestService,
        profile: &ConnectionProfile,
    ) -> Result<Self, ClusterError> {
        let props = profile.strip_prefix(keys::SCHEMA_REGISTRY_PREFIX);

        let missing_capacity = parse_tunable(
            &props,
            keys::MISSING_CACHE_SIZE,
            MISSING_CACHE_DEFAULT_SIZE as u64,
        )? as usize;
        let missing_id_ttl = Duration::from_millis(parse_tunable(
            &props,
            keys::MISSING_ID_CACHE_TTL_MS,
            MISSING_ID_CACHE_DEFAULT_TTL_MS,
        )?);
        let missing_schema_ttl = Duration::from_millis(parse_tunable(
            &props,
            keys::MISSING_SCHEMA_CACHE_TTL_MS,
            MISSING_SCHEMA_CACHE_DEFAULT_TTL_MS,
        )?);

        let providers: Vec<Arc<dyn SchemaFormatProvider>> = vec![
            Arc::new(AvroFormatProvider),
            Arc::new(JsonFormatProvider),
            Arc::new(ProtobufFormatProvider),
        ];

        Ok(Self {
            rest,
            providers,
            id_cache: Mutex::new(IdentifierCache::new(IDENTIFIER_CACHE_CAPACITY)),
            missing_ids: Mutex::new(MissingCache::new(missing_capacity, missing_id_ttl)),
            missing_subjects: Mutex::new(MissingCache::new(missing_capacity, missing_schema_ttl)),
        })
    }

    pub fn rest(&self) -> &RegistryRestService {
        &self.rest
    }

    pub fn registered_formats(&self) -> Vec<SchemaFormat> {
        self.providers.iter().map(|p| p.format()).collect()
    }

    pub async fn subjects(&self) -> Result<Vec<String>, ClusterError> {
        self.rest.subjects().await
    }

    pub async fn subject_versions(&self, subject: &str) -> Result<Vec<i32>, ClusterError> {
        self.rest.subject_versions(subject).await
    }

    /// Resolve a schema by id through the identifier cache.
    pub async fn schema_by_id(&self, id: u32) -> Result<RegistrySchema, ClusterError> {
        if let Some(cached) = self.id_cache.lock().await.get(id) {
            return Ok(cached);
        }
        if self.missing_ids.lock().await.is_missing(&id) {
            return Err(ClusterError::SchemaNotFound(format!("id {}", id)));
        }

        match self.rest.schema_by_id(id).await {
            Ok(response) => {
                let schema = self.validated(
                    id,
                    None,
                    None,
                    response.schema_type.as_deref(),
                    response.schema,
                )?;
                self.id_cache.lock().await.put(schema.clone());
                Ok(schema)
            }
            Err(ClusterError::Rest { status: 404, .. }) => {
                self.missing_ids.lock().await.record(id);
                Err(ClusterError::SchemaNotFound(format!("id {}", id)))
            }
            Err(other) => Err(other),
        }
    }

    /// Resolve the latest version of a subject. Hits the registry on every
    /// call (latest is a moving target) but feeds the identifier cache and
    /// honors the missing-subject negative cache.
    pub async fn latest_schema(&self, subject: &str) -> Result<RegistrySchema, ClusterError> {
        if self
            .missing_subjects
            .lock()
            .await
            .is_missing(&subject.to_string())
        {
            return Err(ClusterError::SchemaNotFound(format!("subject {}", subject)));
        }

        match self.rest.latest_subject_version(subject).await {
            Ok(response) => {
                let schema = self.validated(
                    response.id,
                    Some(response.subject),
                    Some(response.version),
                    response.schema_type.as_deref(),
                    response.schema,
                )?;
                self.id_cache.lock().await.put(schema.clone());
                Ok(schema)
            }
            Err(ClusterError::Rest { status: 404, .. }) => {
                self.missing_subjects
                    .lock()
                    .await
                    .record(subject.to_string());
                Err(ClusterError::SchemaNotFound(format!("subject {}", subject)))
            }
            Err(other) => Err(other),
        }
    }

    /// Drop every cached schema and negative entry. The client remains
    /// usable; the next lookup repopulates the caches.
    pub async fn reset(&self) {
        self.id_cache.lock().await.clear();
        self.missing_ids.lock().await.clear();
        self.missing_subjects.lock().await.clear();
        log::debug!("Reset schema caches for registry {}", self.rest.base_url());
    }

    fn validated(
        &self,
        id: u32,
        subject: Option<String>,
        version: Option<i32>,
        schema_type: Option<&str>,
        definition: String,
    ) -> Result<RegistrySchema, ClusterError> {
        let format = SchemaFormat::from_registry_type(schema_type).ok_or_else(|| {
            ClusterError::Schema(format!(
                "unsupported schema type {:?} for id {}",
                schema_type, id
            ))
        })?;
        let provider = self
            .providers
            .iter()
            .find(|provider| provider.format() == format)
            .ok_or_else(|| {
                ClusterError::Schema(format!("no provider registered for {}", format.as_str()))
            })?;
        provider.validate(&definition)?;

        Ok(RegistrySchema {
            id,
            subject,
            version,
            format,
            definition,
        })
    }
}

fn parse_tunable(
    props: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ClusterError> {
    match props.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ClusterError::InvalidProfile(format!("{} is not a number: {}", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::config::SchemaRegistryDefinition;
    use crate::fleet::profile::registry_profile;

    fn client() -> SchemaRegistryClient {
        let profile = registry_profile(&SchemaRegistryDefinition::new("http://registry:8081"));
        let rest = RegistryRestService::from_profile(&profile).unwrap();
        SchemaRegistryClient::from_profile(rest, &profile).unwrap()
    }

    #[test]
    fn test_format_from_registry_type() {
        assert_eq!(
            SchemaFormat::from_registry_type(None),
            Some(SchemaFormat::Avro)
        );
        assert_eq!(
            SchemaFormat::from_registry_type(Some("JSON")),
            Some(SchemaFormat::Json)
        );
        assert_eq!(
            SchemaFormat::from_registry_type(Some("PROTOBUF")),
            Some(SchemaFormat::Protobuf)
        );
        assert_eq!(SchemaFormat::from_registry_type(Some("THRIFT")), None);
    }

    #[test]
    fn test_three_providers_registered() {
        let client = client();
        let formats = client.registered_formats();
        assert_eq!(formats.len(), 3);
        assert!(formats.contains(&SchemaFormat::Avro));
        assert!(formats.contains(&SchemaFormat::Json));
        assert!(formats.contains(&SchemaFormat::Protobuf));
    }

    #[test]
    fn test_avro_provider_rejects_malformed_schema() {
        let client = client();
        let result = client.validated(1, None, None, Some("AVRO"), "{not avro".to_string());
        assert!(matches!(result, Err(ClusterError::Schema(_))));
    }

    #[test]
    fn test_identifier_cache_eviction_order() {
        let mut cache = IdentifierCache::new(2);
        for id in 1..=2u32 {
            cache.put(RegistrySchema {
                id,
                subject: None,
                version: None,
                format: SchemaFormat::Avro,
                definition: "\"string\"".to_string(),
            });
        }
        // Touch id 1 so id 2 becomes the eviction candidate.
        assert!(cache.get(1).is_some());
        cache.put(RegistrySchema {
            id: 3,
            subject: None,
            version: None,
            format: SchemaFormat::Avro,
            definition: "\"string\"".to_string(),
        });

        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_caches() {
        let client = client();
        client.id_cache.lock().await.put(RegistrySchema {
            id: 9,
            subject: None,
            version: None,
            format: SchemaFormat::Avro,
            definition: "\"string\"".to_string(),
        });
        client.missing_ids.lock().await.record(10);

        client.reset().await;

        assert!(client.id_cache.lock().await.get(9).is_none());
        assert!(!client.missing_ids.lock().await.is_missing(&10));
    }

    #[test]
    fn test_missing_cache_expiry() {
        let mut cache: MissingCache<u32> = MissingCache::new(16, Duration::from_millis(0));
        cache.record(5);
        // Zero TTL expires immediately.
        assert!(!cache.is_missing(&5));
    }

    #[test]
    fn test_missing_cache_capacity_bound() {
        let mut cache: MissingCache<u32> = MissingCache::new(2, Duration::from_secs(60));
        cache.record(1);
        cache.record(2);
        cache.record(3);
        let missing = [1u32, 2, 3]
            .iter()
            .filter(|id| cache.is_missing(id))
            .count();
        assert_eq!(missing, 2);
        assert!(cache.is_missing(&3));
    }
}
